//! Application of field edits to one file's text.

use crate::change::{EditOp, FieldEdit};
use crate::pointer;
use yamlpatch::{Document, Op};

/// An edit none of whose candidates applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedEdit {
    /// Position in the edit list
    pub index: usize,
    pub pointer: String,
    pub reason: String,
}

/// Outcome of applying a file's edits.
#[derive(Debug, Clone)]
pub struct Applied {
    pub content: String,
    /// Operations that took effect, in order
    pub ops: Vec<Op>,
    pub dropped: Vec<DroppedEdit>,
}

/// Apply `edits` to `original`.
///
/// A set is tried as a replace against the base pointer, then the
/// `targets.<target>` pointer, then as an add against both. A field declared
/// under both pointers in one file is therefore written at the base. A remove is
/// tried against both. Edits that fail everywhere are reported in
/// [`Applied::dropped`] and do not stop the others. Only fails when
/// `original` itself cannot be parsed.
pub fn apply_edits(
    original: &str,
    edits: &[FieldEdit],
    target: Option<&str>,
) -> yamlpatch::Result<Applied> {
    let mut document = Document::parse(original)?;
    let mut ops = Vec::new();
    let mut dropped = Vec::new();

    for (index, edit) in edits.iter().enumerate() {
        let mut candidates = vec![edit.pointer.clone()];
        if let Some(target) = target {
            candidates.push(pointer::with_overlay(&edit.pointer, target));
        }
        let attempts: Vec<Op> = match &edit.op {
            EditOp::Set(value) => candidates
                .iter()
                .map(|p| Op::replace(p.as_str(), value.clone()))
                .chain(candidates.iter().map(|p| Op::add(p.as_str(), value.clone())))
                .collect(),
            EditOp::Remove => candidates.iter().map(|p| Op::remove(p.as_str())).collect(),
        };

        let mut last_error = None;
        let applied = attempts.into_iter().find(|op| match document.apply(op) {
            Ok(()) => true,
            Err(err) => {
                log::trace!("{} {} failed: {err}", op.name(), op.path());
                last_error = Some(err);
                false
            }
        });
        match applied {
            Some(op) => {
                log::debug!("{} {}", op.name(), op.path());
                ops.push(op);
            }
            None => dropped.push(DroppedEdit {
                index,
                pointer: edit.pointer.clone(),
                reason: last_error.map(|e| e.to_string()).unwrap_or_default(),
            }),
        }
    }

    Ok(Applied {
        content: document.into_text(),
        ops,
        dropped,
    })
}
