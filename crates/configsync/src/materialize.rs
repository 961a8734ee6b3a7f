//! Creation of missing parents before an insert.
//!
//! The patcher only adds a value whose parent exists. Each file being edited
//! keeps a plain value mirror of its content; when an edit's parent is
//! missing the edit is rewritten to add the topmost missing ancestor with
//! the whole subtree built below it, and the mirror is updated so later
//! edits of the batch see the new containers.

use crate::path::{PathSegment, PatternPath};
use serde_json::{Map, Value};

/// Empty container suited to hold `next`.
fn container_for(next: &PathSegment) -> Value {
    match next {
        PathSegment::Key(_) => Value::Object(Map::new()),
        PathSegment::Index(index) | PathSegment::Append(index) => {
            Value::Array(vec![Value::Object(Map::new()); index + 1])
        }
    }
}

/// Create every missing proper prefix of `path`. Returns whether the parent
/// of `path` exists afterwards. Applying it twice changes nothing.
pub fn ensure_exists(tree: &mut Value, path: &PatternPath) -> bool {
    let segments = path.segments();
    let Some(first) = segments.first() else {
        return true;
    };
    if tree.is_null() {
        *tree = container_for(first);
    }

    let mut cursor = tree;
    for pair in segments.windows(2) {
        let next = match (cursor, &pair[0]) {
            (Value::Object(map), PathSegment::Key(key)) => map
                .entry(key.clone())
                .or_insert_with(|| container_for(&pair[1])),
            (Value::Array(items), PathSegment::Index(index)) => {
                if items.len() <= *index {
                    items.resize(index + 1, Value::Object(Map::new()));
                }
                &mut items[*index]
            }
            _ => return false,
        };
        if next.is_null() {
            *next = container_for(&pair[1]);
        }
        cursor = next;
    }
    true
}

fn child<'v>(node: &'v Value, segment: &PathSegment) -> Option<&'v Value> {
    match (node, segment) {
        (Value::Object(map), PathSegment::Key(key)) => map.get(key),
        (Value::Array(items), PathSegment::Index(index)) => items.get(*index),
        _ => None,
    }
}

/// Number of leading segments of `path` that resolve in `tree`.
pub fn existing_depth(tree: &Value, path: &PatternPath) -> usize {
    let mut cursor = tree;
    for (depth, segment) in path.segments().iter().enumerate() {
        match child(cursor, segment) {
            Some(next) => cursor = next,
            None => return depth,
        }
    }
    path.len()
}

/// Whether the value `path` would be added to exists as a container.
pub fn parent_exists(tree: &Value, path: &PatternPath) -> bool {
    let parent = path.parent();
    existing_depth(tree, &parent) == parent.len()
        && lookup(tree, &parent).is_some_and(|v| v.is_object() || v.is_array())
}

pub fn lookup<'v>(tree: &'v Value, path: &PatternPath) -> Option<&'v Value> {
    path.segments()
        .iter()
        .try_fold(tree, |node, segment| child(node, segment))
}

/// Write `value` at `path`, whose parent must exist. An index equal to the
/// sequence length appends.
pub fn set(tree: &mut Value, path: &PatternPath, value: Value) -> bool {
    let Some(last) = path.last() else {
        *tree = value;
        return true;
    };
    let Some(parent) = lookup_mut(tree, &path.parent()) else {
        return false;
    };
    match (parent, last) {
        (Value::Object(map), PathSegment::Key(key)) => {
            map.insert(key.clone(), value);
            true
        }
        (Value::Array(items), PathSegment::Index(index)) if *index < items.len() => {
            items[*index] = value;
            true
        }
        (Value::Array(items), PathSegment::Index(index)) if *index == items.len() => {
            items.push(value);
            true
        }
        _ => false,
    }
}

/// Delete the value at `path`.
pub fn remove(tree: &mut Value, path: &PatternPath) -> bool {
    let Some(last) = path.last() else {
        return false;
    };
    let Some(parent) = lookup_mut(tree, &path.parent()) else {
        return false;
    };
    match (parent, last) {
        (Value::Object(map), PathSegment::Key(key)) => map.shift_remove(key).is_some(),
        (Value::Array(items), PathSegment::Index(index)) if *index < items.len() => {
            items.remove(*index);
            true
        }
        _ => false,
    }
}

fn lookup_mut<'v>(tree: &'v mut Value, path: &PatternPath) -> Option<&'v mut Value> {
    path.segments()
        .iter()
        .try_fold(tree, |node, segment| match (node, segment) {
            (Value::Object(map), PathSegment::Key(key)) => map.get_mut(key),
            (Value::Array(items), PathSegment::Index(index)) => items.get_mut(*index),
            _ => None,
        })
}

/// A set edit rewritten so that its parent exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Materialized {
    pub path: PatternPath,
    pub value: Value,
    /// Whether missing containers had to be created
    pub created: bool,
}

/// Prepare a set of `value` at `path` in the file mirrored by `mirror`.
///
/// When the parent exists at the base path or under `targets.<target>` the
/// edit is kept as is. Otherwise the candidate with the deeper existing
/// prefix is completed, preferring the base path on ties.
pub fn materialize(
    mirror: &mut Value,
    path: &PatternPath,
    target: Option<&str>,
    value: Value,
) -> Materialized {
    let overlay = target.map(|t| path.under_target(t));

    if parent_exists(mirror, path) {
        set(mirror, path, value.clone());
        return Materialized {
            path: path.clone(),
            value,
            created: false,
        };
    }
    if let Some(overlay) = overlay.as_ref().filter(|o| parent_exists(mirror, o)) {
        set(mirror, overlay, value.clone());
        return Materialized {
            path: path.clone(),
            value,
            created: false,
        };
    }

    let mut chosen = path;
    if let Some(overlay) = &overlay
        && existing_depth(mirror, overlay) > existing_depth(mirror, path) + 2
    {
        chosen = overlay;
    }

    let depth = existing_depth(mirror, chosen);
    let anchor = chosen.truncated(depth + 1);
    let rest = PatternPath::new(chosen.segments()[depth + 1..].to_vec());
    let subtree = build(&rest, value.clone());

    ensure_exists(mirror, chosen);
    set(mirror, chosen, value);

    let path = if std::ptr::eq(chosen, path) {
        anchor
    } else {
        // The applier adds the overlay prefix itself.
        anchor.without_prefix(2)
    };
    Materialized {
        path,
        value: subtree,
        created: true,
    }
}

/// Value that holds `leaf` at the relative path `rest`.
fn build(rest: &PatternPath, leaf: Value) -> Value {
    let Some(first) = rest.segments().first() else {
        return leaf;
    };
    let mut root = container_for(first);
    ensure_exists(&mut root, rest);
    set(&mut root, rest, leaf);
    root
}
