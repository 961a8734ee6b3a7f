//! Field path expressions and resolved paths.
//!
//! A field path names one value inside the configuration tree:
//!
//! ```text
//! resources.jobs.nightly.tasks[task_key='ingest'].timeout_seconds
//! resources.jobs.nightly.tasks[0].depends_on
//! ```
//!
//! Keys are separated by dots. A bracket after a key either holds a decimal
//! index or a `key='value'` selector naming the element whose `key` field
//! equals `value`. A quote inside a selector value is written twice.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Mapping key
    Key(String),
    /// Sequence position
    Index(usize),
    /// Sequence element whose `key` field equals `value`
    Select { key: String, value: String },
}

/// A parsed field path expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Parse a field path expression. The empty string is the root.
    pub fn parse(expr: &str) -> Result<Self> {
        let mut segments = Vec::new();
        if expr.is_empty() {
            return Ok(Self { segments });
        }

        let mut rest = expr;
        loop {
            let end = rest.find(['.', '[', ']']).unwrap_or(rest.len());
            let key = &rest[..end];
            if key.is_empty() {
                return Err(Error::invalid_path(expr, "empty key"));
            }
            segments.push(Segment::Key(key.to_string()));
            rest = &rest[end..];

            while let Some(body) = rest.strip_prefix('[') {
                let (segment, consumed) = parse_bracket(expr, body)?;
                segments.push(segment);
                rest = &body[consumed..];
            }

            match rest.chars().next() {
                None => break,
                Some('.') => rest = &rest[1..],
                Some(c) => {
                    return Err(Error::invalid_path(expr, format!("unexpected '{c}'")));
                }
            }
            if rest.is_empty() {
                return Err(Error::invalid_path(expr, "trailing '.'"));
            }
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The first `len` segments.
    #[must_use]
    pub fn prefix(&self, len: usize) -> FieldPath {
        FieldPath::new(self.segments[..len.min(self.segments.len())].to_vec())
    }

    /// This path followed by `other`.
    #[must_use]
    pub fn join(&self, other: &FieldPath) -> FieldPath {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        FieldPath { segments }
    }

    /// Path under `targets.<target>`.
    #[must_use]
    pub fn under_target(&self, target: &str) -> FieldPath {
        FieldPath::new(vec![
            Segment::Key("targets".to_string()),
            Segment::Key(target.to_string()),
        ])
        .join(self)
    }
}

/// Parse the text after `[`, returning the segment and bytes consumed
/// including the closing `]`.
fn parse_bracket(expr: &str, body: &str) -> Result<(Segment, usize)> {
    let digits = body.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 && body[digits..].starts_with(']') {
        let index = body[..digits]
            .parse()
            .map_err(|_| Error::invalid_path(expr, "index out of range"))?;
        return Ok((Segment::Index(index), digits + 1));
    }

    let Some(eq) = body.find("='") else {
        return Err(Error::invalid_path(expr, "expected index or key='value'"));
    };
    let key = &body[..eq];
    if key.is_empty() || key.contains([']', '[', '.', '\'']) {
        return Err(Error::invalid_path(expr, "invalid selector key"));
    }

    let mut value = String::new();
    let mut chars = body[eq + 2..].char_indices();
    while let Some((i, c)) = chars.next() {
        if c != '\'' {
            value.push(c);
            continue;
        }
        let after = &body[eq + 2 + i + 1..];
        if after.starts_with('\'') {
            value.push('\'');
            chars.next();
        } else if after.starts_with(']') {
            let consumed = eq + 2 + i + 2;
            let segment = Segment::Select {
                key: key.to_string(),
                value,
            };
            return Ok((segment, consumed));
        } else {
            return Err(Error::invalid_path(expr, "expected ']' after selector"));
        }
    }
    Err(Error::invalid_path(expr, "unterminated selector"))
}

impl FromStr for FieldPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{key}")?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
                Segment::Select { key, value } => {
                    write!(f, "[{key}='{}']", value.replace('\'', "''"))?;
                }
            }
        }
        Ok(())
    }
}

/// One step of a [`PatternPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
    /// Append to a sequence that currently holds this many elements
    Append(usize),
}

/// A field path with every selector replaced by a position.
///
/// `Append` only appears for Add targets that do not exist yet and is
/// turned into an index by [`IndexLog`](crate::reconcile::IndexLog).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PatternPath {
    segments: Vec<PathSegment>,
}

impl PatternPath {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Path made only of mapping keys.
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: keys.into_iter().map(|k| PathSegment::Key(k.into())).collect(),
        }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Everything but the last segment. The root is its own parent.
    #[must_use]
    pub fn parent(&self) -> PatternPath {
        let end = self.segments.len().saturating_sub(1);
        Self::new(self.segments[..end].to_vec())
    }

    /// The first `len` segments.
    #[must_use]
    pub fn truncated(&self, len: usize) -> PatternPath {
        Self::new(self.segments[..len.min(self.segments.len())].to_vec())
    }

    /// Same path with the last segment replaced.
    #[must_use]
    pub fn with_last(&self, segment: PathSegment) -> PatternPath {
        let mut path = self.parent();
        path.segments.push(segment);
        path
    }

    /// Same path under `targets.<target>`.
    #[must_use]
    pub fn under_target(&self, target: &str) -> PatternPath {
        let mut segments = vec![
            PathSegment::Key("targets".to_string()),
            PathSegment::Key(target.to_string()),
        ];
        segments.extend(self.segments.iter().cloned());
        Self::new(segments)
    }

    /// Same path with the first `len` segments dropped.
    #[must_use]
    pub fn without_prefix(&self, len: usize) -> PatternPath {
        Self::new(self.segments[len.min(self.segments.len())..].to_vec())
    }

    /// Whether any segment is still an append placeholder.
    pub fn has_append(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, PathSegment::Append(_)))
    }
}

impl fmt::Display for PatternPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{key}")?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
                PathSegment::Append(_) => write!(f, "[*]")?,
            }
        }
        Ok(())
    }
}
