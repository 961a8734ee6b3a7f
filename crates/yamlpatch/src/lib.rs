//! # yamlpatch
//!
//! Format-preserving edits of block-style YAML documents.
//!
//! Operations are addressed with RFC 6901 pointers and follow JSON Patch
//! semantics (`add`, `replace`, `remove`), but instead of re-serializing the
//! document each operation is turned into the smallest text splice that
//! produces the new value. Comments, blank lines, key order and quoting
//! outside the touched region come out byte-identical.
//!
//! ## Example
//!
//! ```
//! use yamlpatch::{Document, Op};
//! use serde_json::json;
//!
//! let mut doc = Document::parse("job:\n  timeout: 3600  # seconds\n").unwrap();
//! doc.apply(&Op::replace("/job/timeout", json!(7200))).unwrap();
//! assert_eq!(doc.text(), "job:\n  timeout: 7200  # seconds\n");
//! ```

pub mod document;
pub mod error;
pub mod patch;
pub mod pointer;
mod render;

pub use document::{Document, Entry, Item, Mapping, Node, Scalar, ScalarStyle, Sequence};
pub use error::{Error, Result};
pub use patch::{Op, apply};
