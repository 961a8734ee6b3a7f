//! Error types for configuration write-back.
//!
//! Errors carry a [`Scope`] so the orchestrator can decide how much work a
//! failure discards: one field edit, one resource, or the whole run.

use std::path::PathBuf;
use thiserror::Error;

/// How much of a reconciliation run an error invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Skip the single field change and continue
    Field,
    /// Drop the owning resource's change set and continue with the next
    Resource,
    /// Abort the run
    Run,
}

/// Errors that can occur while writing changes back to configuration files.
#[derive(Debug, Error)]
pub enum Error {
    /// Field path expression does not follow the path grammar
    #[error("invalid field path {path:?}: {message}")]
    InvalidPath {
        /// The expression as given
        path: String,
        /// What is wrong with it
        message: String,
    },

    /// A `[key='value']` selector was applied to something that is not a sequence
    #[error("selector on non-array value at {path}")]
    SelectorOnNonArray {
        /// Full field path being resolved
        path: String,
    },

    /// No sequence element matched a selector
    #[error("no array element found for {selector} in {path}")]
    NoArrayElement {
        /// Full field path being resolved
        path: String,
        /// The selector that matched nothing
        selector: String,
    },

    /// Pointer encoding was asked for a path that still holds a placeholder
    #[error("path {path} is not fully resolved")]
    UnresolvedPath {
        /// Display form of the offending path
        path: String,
    },

    /// Malformed pointer string
    #[error("invalid pointer {pointer:?}: {message}")]
    InvalidPointer {
        /// The pointer as given
        pointer: String,
        /// What is wrong with it
        message: String,
    },

    /// Neither the field nor its owning resource has a source file
    #[error("no source file declares {resource}")]
    NoSourceFile {
        /// Resource key, e.g. `resources.jobs.nightly`
        resource: String,
    },

    /// Reading a source file failed
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that could not be read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A source file is not YAML the patcher understands
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File that could not be parsed
        path: String,
        /// Underlying error
        #[source]
        source: yamlpatch::Error,
    },
}

impl Error {
    /// How much work this error invalidates.
    pub fn scope(&self) -> Scope {
        match self {
            Self::InvalidPath { .. }
            | Self::SelectorOnNonArray { .. }
            | Self::NoArrayElement { .. }
            | Self::UnresolvedPath { .. }
            | Self::InvalidPointer { .. } => Scope::Field,
            Self::NoSourceFile { .. } => Scope::Resource,
            Self::Io { .. } | Self::Parse { .. } => Scope::Run,
        }
    }

    pub(crate) fn invalid_path(path: &str, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for write-back operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes() {
        assert_eq!(Error::invalid_path("a..b", "empty segment").scope(), Scope::Field);
        assert_eq!(
            Error::NoSourceFile {
                resource: "resources.jobs.a".into()
            }
            .scope(),
            Scope::Resource
        );
        assert_eq!(
            Error::Parse {
                path: "a.yml".into(),
                source: yamlpatch::Error::NotFound("/".into())
            }
            .scope(),
            Scope::Run
        );
    }
}
