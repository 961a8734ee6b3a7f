//! Planner input and reconciler output.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Kind of difference the planner found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[serde(alias = "Add")]
    Add,
    #[serde(alias = "Replace", alias = "update")]
    Replace,
    #[serde(alias = "Remove", alias = "delete")]
    Remove,
    #[serde(alias = "Skip")]
    Skip,
}

impl Action {
    /// Sort rank within one depth: removes come first.
    pub(crate) fn rank(self) -> u8 {
        match self {
            Action::Remove => 0,
            Action::Add | Action::Replace | Action::Skip => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Replace => "replace",
            Action::Remove => "remove",
            Action::Skip => "skip",
        }
    }
}

/// One field-level difference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeDescriptor {
    pub action: Action,
    #[serde(default, alias = "old", skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(default, alias = "remote", skip_serializing_if = "Option::is_none")]
    pub remote_value: Option<Value>,
}

impl ChangeDescriptor {
    pub fn add(remote: Value) -> Self {
        Self {
            action: Action::Add,
            old_value: None,
            remote_value: Some(remote),
        }
    }

    pub fn replace(old: Value, remote: Value) -> Self {
        Self {
            action: Action::Replace,
            old_value: Some(old),
            remote_value: Some(remote),
        }
    }

    pub fn remove(old: Value) -> Self {
        Self {
            action: Action::Remove,
            old_value: Some(old),
            remote_value: None,
        }
    }

    pub fn skip() -> Self {
        Self {
            action: Action::Skip,
            old_value: None,
            remote_value: None,
        }
    }
}

/// Changes of one resource keyed by field path expression.
pub type ResourceChanges = BTreeMap<String, ChangeDescriptor>;

/// Changes keyed by resource key, e.g. `resources.jobs.nightly`.
pub type Changes = BTreeMap<String, ResourceChanges>;

/// What a [`FieldEdit`] does to its target.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOp {
    Set(Value),
    Remove,
}

/// A single edit against one file.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEdit {
    pub pointer: String,
    pub op: EditOp,
}

impl FieldEdit {
    pub fn set(pointer: impl Into<String>, value: Value) -> Self {
        Self {
            pointer: pointer.into(),
            op: EditOp::Set(value),
        }
    }

    pub fn remove(pointer: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            op: EditOp::Remove,
        }
    }
}

/// New contents for one touched file. Writing it is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub path: String,
    pub original_content: String,
    pub modified_content: String,
}
