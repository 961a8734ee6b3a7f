//! Error types for YAML parsing and patching.

use thiserror::Error;

/// Errors raised while parsing a document or applying an operation.
///
/// A failed operation never leaves a [`Document`](crate::Document) half-edited,
/// so callers can try alternative pointers after any of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The document is not block-style YAML this crate understands
    #[error("invalid YAML at line {line}: {message}")]
    Parse {
        /// Line of the offending construct (1-indexed)
        line: usize,
        /// What was expected or unsupported
        message: String,
    },

    /// Malformed RFC 6901 pointer
    #[error("invalid pointer {pointer:?}: {message}")]
    InvalidPointer {
        /// The pointer as given
        pointer: String,
        /// Why it was rejected
        message: String,
    },

    /// The pointer (or its parent) does not address an existing node
    #[error("path not found: {0}")]
    NotFound(String),

    /// The parent of the pointer is a scalar
    #[error("not a container: {0}")]
    NotAContainer(String),

    /// Sequence index past the end of the sequence
    #[error("index {index} out of bounds at {pointer} (length {len})")]
    IndexOutOfBounds {
        /// Pointer of the sequence
        pointer: String,
        /// Requested index
        index: usize,
        /// Current sequence length
        len: usize,
    },

    /// Operation is valid JSON Patch but has no sensible text rendition
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

/// Result type for YAML patch operations.
pub type Result<T> = std::result::Result<T, Error>;
