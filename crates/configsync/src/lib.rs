//! # configsync
//!
//! Writes field-level remote drift back into declarative configuration
//! sources.
//!
//! A planner compares deployed remote state with the local configuration
//! and reports differences per resource and field. This crate turns those
//! differences into minimal edits of the original YAML files, landing each
//! edit in the file that declares it even when configuration is spread over
//! includes and per-target overlays.
//!
//! ## Core Concepts
//!
//! - **ConfigTree**: the loaded configuration, every node annotated with its
//!   source file and line
//! - **Changes**: planner output, `resource -> field path -> change`
//! - **Reconciler**: resolves, orders and places edits, then patches each
//!   touched file once
//! - **DiagnosticSink**: receives every skip, rewrite and failure
//!
//! ## Example
//!
//! ```
//! use configsync::{ChangeDescriptor, ConfigTree, LogSink, MemorySource, Node, reconcile};
//! use serde_json::json;
//! use std::collections::BTreeMap;
//!
//! let yaml = "resources:\n  jobs:\n    etl:\n      timeout_seconds: 3600 # one hour\n";
//! let doc = yamlpatch::Document::parse(yaml).unwrap();
//! let tree = ConfigTree::new(Node::from_document("job.yml", &doc));
//! let files = MemorySource::new().with_file("job.yml", yaml);
//!
//! let changes = BTreeMap::from([(
//!     "resources.jobs.etl".to_string(),
//!     BTreeMap::from([(
//!         "timeout_seconds".to_string(),
//!         ChangeDescriptor::replace(json!(3600), json!(7200)),
//!     )]),
//! )]);
//!
//! let result = reconcile(&changes, &tree, &files, &mut LogSink).unwrap();
//! assert_eq!(
//!     result[0].modified_content,
//!     "resources:\n  jobs:\n    etl:\n      timeout_seconds: 7200 # one hour\n"
//! );
//! ```

pub mod apply;
pub mod change;
pub mod defaults;
pub mod diagnostics;
pub mod error;
pub mod location;
pub mod materialize;
pub mod orchestrator;
pub mod path;
pub mod pointer;
pub mod reconcile;
pub mod resolve;
pub mod source;
pub mod tree;

pub use change::{
    Action, ChangeDescriptor, Changes, EditOp, FieldEdit, FileChange, ResourceChanges,
};
pub use defaults::{Comparison, DefaultRule, DefaultRules, Pattern};
pub use diagnostics::{
    CollectingSink, Diagnostic, DiagnosticKind, DiagnosticSink, LogSink, NoDiagnostics,
};
pub use error::{Error, Result, Scope};
pub use orchestrator::{FilePlan, Origin, Reconciler, reconcile};
pub use path::{FieldPath, PathSegment, PatternPath, Segment};
pub use resolve::{Resolved, resolve};
pub use source::{FsSource, MemorySource, SourceFiles};
pub use tree::{ConfigTree, Location, Node};
