//! Resolution of field paths to positional paths.
//!
//! The loader may reorder sequence elements in memory, so a selector match
//! is turned into the element's position in its source file rather than its
//! position in the tree.

use crate::change::Action;
use crate::error::{Error, Result};
use crate::path::{FieldPath, PathSegment, PatternPath, Segment};
use crate::tree::{ConfigTree, Location, Node};
use serde_json::Value;

/// Outcome of resolving one field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub path: PatternPath,
    /// Location of the addressed node, empty when it does not exist
    pub location: Location,
}

/// Resolve `path` against `tree` for a change of kind `action`.
///
/// A selector that matches nothing yields an append placeholder for adds
/// and an error otherwise.
pub fn resolve(path: &FieldPath, tree: &ConfigTree, action: Action) -> Result<Resolved> {
    let mut cursor = tree.root();
    let mut segments = Vec::with_capacity(path.len());

    for segment in path.segments() {
        match segment {
            Segment::Key(key) => {
                cursor = cursor.get(key);
                segments.push(PathSegment::Key(key.clone()));
            }
            Segment::Index(index) => {
                cursor = cursor.index(*index);
                segments.push(PathSegment::Index(*index));
            }
            Segment::Select { key, value } => {
                let (resolved, next) = select(cursor, key, value, action, path)?;
                segments.push(resolved);
                cursor = next;
            }
        }
    }

    Ok(Resolved {
        path: PatternPath::new(segments),
        location: cursor.location().clone(),
    })
}

fn select<'t>(
    cursor: &'t Node,
    key: &str,
    value: &str,
    action: Action,
    path: &FieldPath,
) -> Result<(PathSegment, &'t Node)> {
    let items = match cursor {
        Node::Sequence { items, .. } => items,
        Node::Absent
        | Node::Scalar {
            value: Value::Null,
            ..
        } if action == Action::Add => {
            return Ok((PathSegment::Append(0), Node::absent()));
        }
        _ => {
            return Err(Error::SelectorOnNonArray {
                path: path.to_string(),
            });
        }
    };

    let found = items
        .iter()
        .find(|item| item.get(key).as_text().as_deref() == Some(value));
    match found {
        Some(item) => Ok((PathSegment::Index(source_position(item, items)), item)),
        None if action == Action::Add => Ok((
            PathSegment::Append(declared_len(cursor, items)),
            Node::absent(),
        )),
        None => Err(Error::NoArrayElement {
            path: path.to_string(),
            selector: format!("[{key}='{}']", value.replace('\'', "''")),
        }),
    }
}

/// Number of siblings declared before `item` in the same file. Members of
/// a flow sequence share one location and keep their in-memory order.
fn source_position(item: &Node, siblings: &[Node]) -> usize {
    let position = siblings
        .iter()
        .position(|s| std::ptr::eq(s, item))
        .unwrap_or_default();
    let here = item.location();
    if here.is_empty() {
        return position;
    }
    let key = (here.line, here.column);
    siblings
        .iter()
        .enumerate()
        .filter(|&(i, s)| {
            let l = s.location();
            let at = (l.line, l.column);
            l.file == here.file && (at < key || (at == key && i < position))
        })
        .count()
}

/// Number of elements declared in the sequence's own file.
fn declared_len(sequence: &Node, items: &[Node]) -> usize {
    let file = &sequence.location().file;
    if file.is_empty() {
        return items.len();
    }
    items
        .iter()
        .filter(|item| item.location().file == *file)
        .count()
}
