//! Conversion between resolved paths and pointer strings.

use crate::error::{Error, Result};
use crate::path::{PathSegment, PatternPath};

/// Encode `path` as a pointer. Append placeholders must be resolved first.
pub fn to_pointer(path: &PatternPath) -> Result<String> {
    let mut pointer = String::new();
    for segment in path.segments() {
        pointer.push('/');
        match segment {
            PathSegment::Key(key) => pointer.push_str(&yamlpatch::pointer::escape(key)),
            PathSegment::Index(index) => pointer.push_str(&index.to_string()),
            PathSegment::Append(_) => {
                return Err(Error::UnresolvedPath {
                    path: path.to_string(),
                });
            }
        }
    }
    Ok(pointer)
}

/// Decode a pointer. Tokens in canonical decimal form become indices.
pub fn from_pointer(pointer: &str) -> Result<PatternPath> {
    let tokens = yamlpatch::pointer::parse(pointer).map_err(|err| Error::InvalidPointer {
        pointer: pointer.to_string(),
        message: err.to_string(),
    })?;
    let segments = tokens
        .into_iter()
        .map(|token| match token.parse::<usize>() {
            Ok(index) if index.to_string() == token => PathSegment::Index(index),
            _ => PathSegment::Key(token),
        })
        .collect();
    Ok(PatternPath::new(segments))
}

/// The same pointer under `/targets/<target>`.
pub fn with_overlay(pointer: &str, target: &str) -> String {
    format!("/targets/{}{pointer}", yamlpatch::pointer::escape(target))
}
