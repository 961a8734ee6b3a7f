//! Location-annotated configuration tree.
//!
//! The tree is what the bundle loader hands the reconciler: every node knows
//! the file, line and column it was declared at. Mapping entries carry the
//! location of their key and sequence items the location of their dash, so
//! a location always points at the line a human would edit.

use crate::error::Result;
use crate::path::{FieldPath, Segment};
use serde_json::{Map, Value};
use std::fmt;

/// Where a node was declared. An empty `file` means not present in source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

static NO_LOCATION: Location = Location {
    file: String::new(),
    line: 0,
    column: 0,
};

impl Location {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.file.is_empty()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "<not in source>")
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

/// A node of the configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Map {
        entries: Vec<(String, Node)>,
        location: Location,
    },
    Sequence {
        items: Vec<Node>,
        location: Location,
    },
    Scalar {
        value: Value,
        location: Location,
    },
    Absent,
}

static ABSENT: Node = Node::Absent;

impl Node {
    /// Shared absent node, returned by lookups that find nothing.
    pub fn absent() -> &'static Node {
        &ABSENT
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Node::Absent)
    }

    pub fn location(&self) -> &Location {
        match self {
            Node::Map { location, .. }
            | Node::Sequence { location, .. }
            | Node::Scalar { location, .. } => location,
            Node::Absent => &NO_LOCATION,
        }
    }

    /// Value under `key`. Duplicate keys resolve to the last one.
    pub fn get(&self, key: &str) -> &Node {
        match self {
            Node::Map { entries, .. } => entries
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map_or(&ABSENT, |(_, v)| v),
            _ => &ABSENT,
        }
    }

    /// Element at `index`.
    pub fn index(&self, index: usize) -> &Node {
        match self {
            Node::Sequence { items, .. } => items.get(index).unwrap_or(&ABSENT),
            _ => &ABSENT,
        }
    }

    /// Follow `path`, matching selectors against in-memory order.
    pub fn lookup(&self, path: &FieldPath) -> &Node {
        path.segments()
            .iter()
            .fold(self, |node, segment| match segment {
                Segment::Key(key) => node.get(key),
                Segment::Index(index) => node.index(*index),
                Segment::Select { key, value } => match node {
                    Node::Sequence { items, .. } => items
                        .iter()
                        .find(|item| item.get(key).as_text().as_deref() == Some(value))
                        .unwrap_or(&ABSENT),
                    _ => &ABSENT,
                },
            })
    }

    /// Scalar rendered as text for selector matching.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Node::Scalar { value, .. } => match value {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                Value::Null | Value::Array(_) | Value::Object(_) => None,
            },
            _ => None,
        }
    }

    /// Plain value of this subtree, `None` when absent.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Node::Map { entries, .. } => {
                let map: Map<String, Value> = entries
                    .iter()
                    .filter_map(|(k, v)| v.to_value().map(|v| (k.clone(), v)))
                    .collect();
                Some(Value::Object(map))
            }
            Node::Sequence { items, .. } => {
                Some(Value::Array(items.iter().filter_map(Node::to_value).collect()))
            }
            Node::Scalar { value, .. } => Some(value.clone()),
            Node::Absent => None,
        }
    }

    /// Build a tree from a parsed file, annotating every node with `file`.
    pub fn from_document(file: &str, document: &yamlpatch::Document) -> Node {
        convert(file, document.root(), Location::new(file, 1, 1))
    }

    /// Merge the `targets.<target>` subtree over this root. The `targets`
    /// mapping itself is kept so overlay declarations stay queryable.
    pub fn apply_target(&mut self, target: &str) {
        let overlay = self.get("targets").get(target).clone();
        if let Node::Map { .. } = overlay {
            self.merge(overlay);
        }
    }

    /// Deep-merge `other` over this node. Mappings merge key by key, a null
    /// never replaces a mapping, any other incoming node replaces the
    /// existing one.
    pub fn merge(&mut self, other: Node) {
        match (self, other) {
            (Node::Map { entries, .. }, Node::Map { entries: incoming, .. }) => {
                for (key, value) in incoming {
                    match entries.iter_mut().rev().find(|(k, _)| *k == key) {
                        Some((_, existing)) => existing.merge(value),
                        None => entries.push((key, value)),
                    }
                }
            }
            (_, Node::Absent)
            | (
                Node::Map { .. },
                Node::Scalar {
                    value: Value::Null,
                    ..
                },
            ) => {}
            (slot, other) => *slot = other,
        }
    }
}

fn convert(file: &str, node: &yamlpatch::Node, location: Location) -> Node {
    match node {
        yamlpatch::Node::Mapping(mapping) => Node::Map {
            entries: mapping
                .entries()
                .iter()
                .map(|entry| {
                    let here = Location::new(file, entry.line(), entry.column());
                    (entry.key().to_string(), convert(file, entry.value(), here))
                })
                .collect(),
            location,
        },
        yamlpatch::Node::Sequence(sequence) => Node::Sequence {
            items: sequence
                .items()
                .iter()
                .map(|item| {
                    let here = Location::new(file, item.line(), item.column());
                    convert(file, item.value(), here)
                })
                .collect(),
            location,
        },
        yamlpatch::Node::Scalar(scalar) => {
            let inner = Location::new(file, scalar.line(), scalar.column());
            match scalar.value() {
                Value::Object(_) | Value::Array(_) => flow(scalar.value(), location, &inner),
                value => Node::Scalar {
                    value: value.clone(),
                    location,
                },
            }
        }
    }
}

/// Expand a flow collection. Its members have no line of their own and all
/// share the location of the opening bracket.
fn flow(value: &Value, location: Location, inner: &Location) -> Node {
    match value {
        Value::Object(map) => Node::Map {
            entries: map
                .iter()
                .map(|(k, v)| (k.clone(), flow(v, inner.clone(), inner)))
                .collect(),
            location,
        },
        Value::Array(items) => Node::Sequence {
            items: items.iter().map(|v| flow(v, inner.clone(), inner)).collect(),
            location,
        },
        value => Node::Scalar {
            value: value.clone(),
            location,
        },
    }
}

/// The loaded configuration together with the active target.
#[derive(Debug, Clone)]
pub struct ConfigTree {
    root: Node,
    target: Option<String>,
}

impl ConfigTree {
    pub fn new(root: Node) -> Self {
        Self { root, target: None }
    }

    /// Mark `target` as the active overlay.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        let target = target.into();
        self.target = (!target.is_empty()).then_some(target);
        self
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn node(&self, path: &FieldPath) -> &Node {
        self.root.lookup(path)
    }

    /// Value at `path`, `None` when the path does not exist.
    pub fn get_value(&self, path: &str) -> Result<Option<Value>> {
        Ok(self.node(&FieldPath::parse(path)?).to_value())
    }

    /// Location of `path`, empty when the path does not exist.
    pub fn get_location(&self, path: &str) -> Result<Location> {
        Ok(self.node(&FieldPath::parse(path)?).location().clone())
    }

    /// Name of the active target, empty when none is active.
    pub fn active_overlay_name(&self) -> &str {
        self.target.as_deref().unwrap_or_default()
    }
}
