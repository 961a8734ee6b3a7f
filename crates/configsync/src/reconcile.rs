//! Index adjustment across the edits of one batch.
//!
//! Every edit is resolved against the original tree, but edits are applied
//! one after another. Once an element is inserted or removed, later edits
//! into the same sequence must shift their indices. The [`IndexLog`] records
//! each edit's original index per sequence and [`adjust_batch`] folds an
//! ordered edit list through it.

use crate::change::Action;
use crate::path::{FieldPath, PathSegment, PatternPath};
use crate::tree::Location;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

/// A prior edit into a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOp {
    pub original_index: usize,
    pub action: Action,
}

/// Prior edits per sequence path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexLog {
    ops: HashMap<PatternPath, Vec<IndexOp>>,
    /// Index given to each new element, keyed by its field path
    created: HashMap<String, usize>,
}

impl IndexLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded edits for the sequence at `parent`.
    pub fn ops(&self, parent: &PatternPath) -> &[IndexOp] {
        self.ops.get(parent).map_or(&[], Vec::as_slice)
    }

    /// Shift the final index of `path` by the inserts and removals recorded
    /// before it. Append placeholders become concrete indices.
    pub fn adjust(&self, path: &PatternPath, action: Action) -> PatternPath {
        let Some((parent, original)) = split_indexed(path) else {
            return path.clone();
        };
        let shift: isize = self
            .ops(&parent)
            .iter()
            .filter(|op| {
                op.original_index < original
                    || (op.original_index == original
                        && op.action == Action::Add
                        && action == Action::Add)
            })
            .map(|op| match op.action {
                Action::Add => 1,
                Action::Remove => -1,
                Action::Replace | Action::Skip => 0,
            })
            .sum();
        let adjusted = original.saturating_add_signed(shift);
        path.with_last(PathSegment::Index(adjusted))
    }

    /// Remember an edit at `path` (the unadjusted path).
    pub fn record(&mut self, path: &PatternPath, action: Action) {
        if let Some((parent, original_index)) = split_indexed(path) {
            self.ops.entry(parent).or_default().push(IndexOp {
                original_index,
                action,
            });
        }
    }

    /// Adjust and record one edit.
    ///
    /// An append placeholder in the middle of a path names an element that
    /// only comes into existence through this batch. The first edit under it
    /// records the element as an add, later edits under the same selector
    /// reuse its index.
    fn step(&mut self, edit: &mut PendingEdit) {
        let original = edit.path.clone();
        let mut segments = original.segments().to_vec();
        let last = segments.len().saturating_sub(1);

        for (position, segment) in segments.iter_mut().enumerate().take(last) {
            let PathSegment::Append(len) = *segment else {
                continue;
            };
            let element = edit.source.prefix(position + 1).to_string();
            let index = match self.created.get(&element) {
                Some(index) => *index,
                None => {
                    let placeholder = original.truncated(position + 1);
                    let index = index_of(&self.adjust(&placeholder, Action::Add)).unwrap_or(len);
                    self.record(&placeholder, Action::Add);
                    self.created.insert(element, index);
                    index
                }
            };
            *segment = PathSegment::Index(index);
        }

        let created = match original.last() {
            Some(PathSegment::Append(_)) => self.created.get(&edit.source.to_string()).copied(),
            _ => None,
        };
        let adjusted = match created {
            Some(index) => Some(index),
            None => {
                let adjusted = index_of(&self.adjust(&original, edit.action));
                self.record(&original, edit.action);
                adjusted
            }
        };
        if let Some(index) = adjusted {
            segments[last] = PathSegment::Index(index);
        }
        edit.path = PatternPath::new(segments);
    }
}

fn index_of(path: &PatternPath) -> Option<usize> {
    match path.last()? {
        PathSegment::Index(index) => Some(*index),
        PathSegment::Key(_) | PathSegment::Append(_) => None,
    }
}

/// Sequence path and original index of a path ending in an element.
fn split_indexed(path: &PatternPath) -> Option<(PatternPath, usize)> {
    match path.last()? {
        PathSegment::Index(index) | PathSegment::Append(index) => Some((path.parent(), *index)),
        PathSegment::Key(_) => None,
    }
}

/// An edit that has been resolved but not yet located.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEdit {
    /// Field path expression relative to the resource
    pub field: String,
    /// Full field path the edit was resolved from
    pub source: FieldPath,
    pub path: PatternPath,
    pub action: Action,
    /// Value to write; `None` for removes
    pub value: Option<Value>,
    pub location: Location,
}

/// A removed element slot taken over by an added one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotReuse {
    pub removed: String,
    pub added: String,
    pub index: usize,
}

/// Turn remove-then-append pairs on the same sequence into replaces.
///
/// Freed indices are handed out first-in first-out and each only once. The
/// paired remove becomes a replace carrying the added element and the add
/// is dropped from the list.
pub fn reuse_freed_slots(edits: &mut Vec<PendingEdit>) -> Vec<SlotReuse> {
    let mut freed: HashMap<PatternPath, VecDeque<usize>> = HashMap::new();
    let mut consumed = vec![false; edits.len()];
    let mut reused = Vec::new();

    for i in 0..edits.len() {
        let (action, parent, last) = {
            let edit = &edits[i];
            (edit.action, edit.path.parent(), edit.path.last().cloned())
        };
        match (action, last) {
            (Action::Remove, Some(PathSegment::Index(_))) => {
                freed.entry(parent).or_default().push_back(i);
            }
            (Action::Add, Some(PathSegment::Append(_))) => {
                let Some(slot) = freed.get_mut(&parent).and_then(VecDeque::pop_front) else {
                    continue;
                };
                let value = edits[i].value.take();
                let added = edits[i].field.clone();
                let removed = &mut edits[slot];
                removed.action = Action::Replace;
                removed.value = value;
                if let Some(PathSegment::Index(index)) = removed.path.last() {
                    reused.push(SlotReuse {
                        removed: removed.field.clone(),
                        added,
                        index: *index,
                    });
                }
                consumed[i] = true;
            }
            _ => {}
        }
    }

    let mut flags = consumed.into_iter();
    edits.retain(|_| !flags.next().unwrap_or(false));
    reused
}

/// Adjust every edit of an ordered batch against the log, returning the
/// adjusted edits and the log extended with this batch.
pub fn adjust_batch(edits: Vec<PendingEdit>, log: IndexLog) -> (Vec<PendingEdit>, IndexLog) {
    edits
        .into_iter()
        .fold((Vec::new(), log), |(mut done, mut log), mut edit| {
            log.step(&mut edit);
            done.push(edit);
            (done, log)
        })
}
