//! Span-annotated parsing of block-style YAML.
//!
//! The parser keeps byte offsets for every key, dash and scalar so that
//! patches can be expressed as small text splices. It understands the subset
//! of YAML that hand-written configuration actually uses:
//!
//! ```text
//! # comment
//! resources:
//!   jobs:
//!     nightly:
//!       timeout_seconds: 3600   # trailing comment
//!       tasks:
//!         - task_key: "ingest"
//!           notebook_task: { notebook_path: ./ingest.py }
//!       description: |
//!         multi-line
//! ```

use crate::error::{Error, Result};
use crate::pointer;
use serde_json::Value;
use std::ops::Range;

/// How a scalar was written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    /// Nothing after `key:` or `-`
    Empty,
    Plain,
    SingleQuoted,
    DoubleQuoted,
    /// `|` block scalar
    Literal,
    /// `>` block scalar
    Folded,
    /// Single-line `[...]` or `{...}`
    Flow,
}

/// A leaf value and the text it occupies.
#[derive(Debug, Clone)]
pub struct Scalar {
    pub(crate) range: Range<usize>,
    pub(crate) style: ScalarStyle,
    pub(crate) value: Value,
    pub(crate) line: usize,
    pub(crate) column: usize,
}

impl Scalar {
    /// Parsed value of the scalar
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn style(&self) -> ScalarStyle {
        self.style
    }

    /// Source line (1-indexed)
    pub fn line(&self) -> usize {
        self.line
    }

    /// Source column (1-indexed)
    pub fn column(&self) -> usize {
        self.column
    }
}

/// A `key: value` pair of a block mapping.
#[derive(Debug, Clone)]
pub struct Entry {
    pub(crate) key: String,
    pub(crate) key_start: usize,
    pub(crate) colon: usize,
    pub(crate) line: usize,
    pub(crate) column: usize,
    pub(crate) value: Node,
    /// End of the last line the entry occupies, before its newline
    pub(crate) end: usize,
}

impl Entry {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Node {
        &self.value
    }

    /// Line of the key (1-indexed)
    pub fn line(&self) -> usize {
        self.line
    }

    /// Column of the key (1-indexed)
    pub fn column(&self) -> usize {
        self.column
    }
}

/// A block mapping.
#[derive(Debug, Clone)]
pub struct Mapping {
    pub(crate) entries: Vec<Entry>,
    /// Column of the keys (0-indexed)
    pub(crate) indent: usize,
}

impl Mapping {
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Look up an entry by key
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().rev().find(|e| e.key == key)
    }

    pub(crate) fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().rposition(|e| e.key == key)
    }
}

/// A `- value` element of a block sequence.
#[derive(Debug, Clone)]
pub struct Item {
    pub(crate) dash: usize,
    pub(crate) line: usize,
    pub(crate) column: usize,
    pub(crate) value: Node,
    pub(crate) end: usize,
}

impl Item {
    pub fn value(&self) -> &Node {
        &self.value
    }

    /// Line of the dash (1-indexed)
    pub fn line(&self) -> usize {
        self.line
    }

    /// Column of the dash (1-indexed)
    pub fn column(&self) -> usize {
        self.column
    }
}

/// A block sequence.
#[derive(Debug, Clone)]
pub struct Sequence {
    pub(crate) items: Vec<Item>,
    /// Column of the dashes (0-indexed)
    pub(crate) indent: usize,
}

impl Sequence {
    pub fn items(&self) -> &[Item] {
        &self.items
    }
}

/// A node of the parsed document.
#[derive(Debug, Clone)]
pub enum Node {
    Mapping(Mapping),
    Sequence(Sequence),
    Scalar(Scalar),
}

impl Node {
    /// Child addressed by one pointer token (mapping key or sequence index)
    pub fn child(&self, token: &str) -> Option<&Node> {
        match self {
            Node::Mapping(m) => m.get(token).map(|e| &e.value),
            Node::Sequence(s) => token
                .parse::<usize>()
                .ok()
                .and_then(|i| s.items.get(i))
                .map(|i| &i.value),
            Node::Scalar(_) => None,
        }
    }

    /// Convert to a JSON value
    pub fn to_value(&self) -> Value {
        match self {
            Node::Mapping(m) => Value::Object(
                m.entries
                    .iter()
                    .map(|e| (e.key.clone(), e.value.to_value()))
                    .collect(),
            ),
            Node::Sequence(s) => Value::Array(s.items.iter().map(|i| i.value.to_value()).collect()),
            Node::Scalar(s) => s.value.clone(),
        }
    }
}

/// A parsed YAML document that owns its source text.
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) text: String,
    pub(crate) root: Node,
}

impl Document {
    /// Parse a document.
    pub fn parse(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let root = parse_root(&text)?;
        Ok(Self { text, root })
    }

    /// Current source text
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// The whole document as a JSON value
    pub fn to_value(&self) -> Value {
        self.root.to_value()
    }

    /// Look up the node addressed by an RFC 6901 pointer.
    pub fn get(&self, pointer: &str) -> Result<Option<&Node>> {
        let tokens = pointer::parse(pointer)?;
        Ok(self.lookup(&tokens))
    }

    pub(crate) fn lookup(&self, tokens: &[String]) -> Option<&Node> {
        tokens
            .iter()
            .try_fold(&self.root, |node, token| node.child(token))
    }
}

pub(crate) fn parse_root(text: &str) -> Result<Node> {
    Parser::new(text).parse_document()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    Comment,
    Content,
}

#[derive(Debug)]
struct Line {
    start: usize,
    end: usize,
    indent: usize,
    kind: LineKind,
}

struct Parser<'a> {
    text: &'a str,
    lines: Vec<Line>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        let mut lines = Vec::new();
        let mut start = 0;
        for segment in text.split_inclusive('\n') {
            let body = segment.strip_suffix('\n').unwrap_or(segment);
            let body = body.strip_suffix('\r').unwrap_or(body);
            let indent = body.len() - body.trim_start_matches(' ').len();
            let rest = &body[indent..];
            let kind = if rest.trim().is_empty() {
                LineKind::Blank
            } else if rest.starts_with('#') {
                LineKind::Comment
            } else {
                LineKind::Content
            };
            lines.push(Line {
                start,
                end: start + body.len(),
                indent,
                kind,
            });
            start += segment.len();
        }
        Self { text, lines }
    }

    fn line_text(&self, line: usize) -> &'a str {
        let l = &self.lines[line];
        &self.text[l.start..l.end]
    }

    fn next_content(&self, from: usize) -> Option<usize> {
        (from..self.lines.len()).find(|&i| self.lines[i].kind == LineKind::Content)
    }

    fn err(&self, line: usize, message: &str) -> Error {
        Error::Parse {
            line: line + 1,
            message: message.to_string(),
        }
    }

    fn parse_document(&self) -> Result<Node> {
        let mut from = 0;
        let first = loop {
            match self.next_content(from) {
                Some(i) => {
                    let text = self.line_text(i);
                    if text.starts_with('%') || text.trim_end() == "---" {
                        from = i + 1;
                        continue;
                    }
                    break Some(i);
                }
                None => break None,
            }
        };

        let Some(first) = first else {
            return Ok(Node::Scalar(Scalar {
                range: self.text.len()..self.text.len(),
                style: ScalarStyle::Empty,
                value: Value::Null,
                line: 1,
                column: 1,
            }));
        };

        let indent = self.lines[first].indent;
        let (root, last) = self.parse_block(first, indent, indent)?;
        if let Some(extra) = self.next_content(last + 1) {
            let text = self.line_text(extra).trim_end();
            let message = if text == "---" || text == "..." {
                "multi-document streams are not supported"
            } else {
                "unexpected content after the document root"
            };
            return Err(self.err(extra, message));
        }
        Ok(root)
    }

    /// Parse the node starting at `col` of `line`.
    ///
    /// Continuation lines of a scalar must be indented past `threshold`.
    /// Returns the node and the last line it occupies.
    fn parse_block(&self, line: usize, col: usize, threshold: usize) -> Result<(Node, usize)> {
        let rest = &self.line_text(line)[col..];
        if is_dash_item(rest) {
            return self.parse_sequence(line, col);
        }
        if rest.starts_with('?') {
            return Err(self.err(line, "complex mapping keys are not supported"));
        }
        if split_key(rest).is_some() {
            return self.parse_mapping(line, col);
        }
        self.parse_scalar(line, col, threshold)
    }

    fn parse_mapping(&self, first: usize, col: usize) -> Result<(Node, usize)> {
        let mut entries = Vec::new();
        let mut line = first;
        let last = loop {
            let text = self.line_text(line);
            let rest = &text[col..];
            let Some(key) = split_key(rest) else {
                return Err(self.err(line, "expected a mapping key"));
            };
            let line_start = self.lines[line].start;
            let key_start = line_start + col;
            let colon = key_start + key.colon;
            let after = &rest[key.colon + 1..];
            let value_text = after.trim();

            let (value, value_last) = if value_text.is_empty() || value_text.starts_with('#') {
                self.parse_nested(line, col, colon)?
            } else {
                let value_col = col + key.colon + 1 + (after.len() - after.trim_start().len());
                self.parse_scalar(line, value_col, col)?
            };

            entries.push(Entry {
                key: key.text,
                key_start,
                colon,
                line: line + 1,
                column: col + 1,
                value,
                end: self.lines[value_last].end,
            });

            match self.next_content(value_last + 1) {
                Some(next)
                    if self.lines[next].indent == col
                        && !is_dash_item(&self.line_text(next)[col..]) =>
                {
                    line = next;
                }
                Some(next) if self.lines[next].indent > col => {
                    return Err(self.err(next, "unexpected indentation"));
                }
                _ => break value_last,
            }
        };
        Ok((Node::Mapping(Mapping { entries, indent: col }), last))
    }

    /// Value of a `key:` whose value starts on a following line.
    fn parse_nested(&self, line: usize, col: usize, colon: usize) -> Result<(Node, usize)> {
        match self.next_content(line + 1) {
            Some(next) if self.lines[next].indent > col => {
                let indent = self.lines[next].indent;
                self.parse_block(next, indent, col)
            }
            Some(next)
                if self.lines[next].indent == col
                    && is_dash_item(&self.line_text(next)[col..]) =>
            {
                self.parse_sequence(next, col)
            }
            _ => {
                let line_start = self.lines[line].start;
                Ok((
                    Node::Scalar(Scalar {
                        range: colon + 1..colon + 1,
                        style: ScalarStyle::Empty,
                        value: Value::Null,
                        line: line + 1,
                        column: colon + 2 - line_start,
                    }),
                    line,
                ))
            }
        }
    }

    fn parse_sequence(&self, first: usize, col: usize) -> Result<(Node, usize)> {
        let mut items = Vec::new();
        let mut line = first;
        let last = loop {
            let text = self.line_text(line);
            let dash = self.lines[line].start + col;
            let after = &text[col + 1..];
            let content = after.trim_start();

            let (value, value_last) = if content.is_empty() || content.starts_with('#') {
                match self.next_content(line + 1) {
                    Some(next) if self.lines[next].indent > col => {
                        let indent = self.lines[next].indent;
                        self.parse_block(next, indent, col)?
                    }
                    _ => (
                        Node::Scalar(Scalar {
                            range: dash + 1..dash + 1,
                            style: ScalarStyle::Empty,
                            value: Value::Null,
                            line: line + 1,
                            column: col + 2,
                        }),
                        line,
                    ),
                }
            } else {
                if is_dash_item(content) {
                    return Err(self.err(line, "nested compact sequences are not supported"));
                }
                let value_col = col + 1 + (after.len() - content.len());
                self.parse_block(line, value_col, col)?
            };

            items.push(Item {
                dash,
                line: line + 1,
                column: col + 1,
                value,
                end: self.lines[value_last].end,
            });

            match self.next_content(value_last + 1) {
                Some(next)
                    if self.lines[next].indent == col
                        && is_dash_item(&self.line_text(next)[col..]) =>
                {
                    line = next;
                }
                Some(next) if self.lines[next].indent > col => {
                    return Err(self.err(next, "unexpected indentation"));
                }
                _ => break value_last,
            }
        };
        Ok((Node::Sequence(Sequence { items, indent: col }), last))
    }

    fn parse_scalar(&self, line: usize, col: usize, threshold: usize) -> Result<(Node, usize)> {
        let rest = &self.line_text(line)[col..];
        let start = self.lines[line].start + col;

        let (style, end, last) = if rest.starts_with('|') || rest.starts_with('>') {
            let mut last = line;
            for i in line + 1..self.lines.len() {
                let l = &self.lines[i];
                if l.kind == LineKind::Blank {
                    continue;
                }
                if l.indent <= threshold {
                    break;
                }
                last = i;
            }
            let style = if rest.starts_with('|') {
                ScalarStyle::Literal
            } else {
                ScalarStyle::Folded
            };
            (style, self.lines[last].end, last)
        } else if rest.starts_with('[') || rest.starts_with('{') {
            let Some(len) = flow_end(rest) else {
                return Err(self.err(line, "multi-line flow collections are not supported"));
            };
            (ScalarStyle::Flow, start + len, line)
        } else {
            let (style, len) = inline_extent(rest);
            let commented = rest[len..].trim_start().starts_with('#');
            let mut last = line;
            if !commented {
                while last + 1 < self.lines.len() {
                    let next = &self.lines[last + 1];
                    if next.kind != LineKind::Content || next.indent <= threshold {
                        break;
                    }
                    let next_rest = &self.line_text(last + 1)[next.indent..];
                    if is_dash_item(next_rest) || split_key(next_rest).is_some() {
                        break;
                    }
                    last += 1;
                }
            }
            let end = if last == line {
                start + len
            } else {
                let l = &self.lines[last];
                l.start + self.text[l.start..l.end].trim_end().len()
            };
            (style, end, last)
        };

        // block scalars keep their final line break
        let raw_end = match style {
            ScalarStyle::Literal | ScalarStyle::Folded => self.text[end..]
                .find('\n')
                .map_or(self.text.len(), |i| end + i + 1),
            _ => end,
        };
        let raw = &self.text[start..raw_end];
        Ok((
            Node::Scalar(Scalar {
                range: start..end,
                style,
                value: scalar_value(raw),
                line: line + 1,
                column: col + 1,
            }),
            last,
        ))
    }
}

/// A split `key:` prefix.
struct KeySplit {
    text: String,
    /// Byte offset of the colon within the examined text
    colon: usize,
}

fn is_dash_item(rest: &str) -> bool {
    rest == "-" || rest.starts_with("- ") || rest.starts_with("-\t")
}

fn is_value_separator(after: &str) -> bool {
    after.is_empty() || after.starts_with(' ') || after.starts_with('\t')
}

fn split_key(rest: &str) -> Option<KeySplit> {
    let first = *rest.as_bytes().first()?;
    match first {
        b'"' | b'\'' => {
            let close = closing_quote(rest)?;
            let after = &rest[close + 1..];
            let trimmed = after.trim_start_matches(' ');
            if !trimmed.starts_with(':') {
                return None;
            }
            let colon = close + 1 + (after.len() - trimmed.len());
            if !is_value_separator(&rest[colon + 1..]) {
                return None;
            }
            let raw = &rest[..=close];
            let text = match serde_yaml::from_str::<Value>(raw) {
                Ok(Value::String(s)) => s,
                _ => raw[1..raw.len() - 1].to_string(),
            };
            Some(KeySplit { text, colon })
        }
        b'[' | b'{' | b'#' | b'|' | b'>' | b'?' => None,
        _ => {
            let mut prev_space = false;
            for (i, c) in rest.char_indices() {
                if c == '#' && prev_space {
                    return None;
                }
                if c == ':' && is_value_separator(&rest[i + 1..]) {
                    let text = rest[..i].trim_end();
                    if text.is_empty() {
                        return None;
                    }
                    return Some(KeySplit {
                        text: text.to_string(),
                        colon: i,
                    });
                }
                prev_space = c == ' ' || c == '\t';
            }
            None
        }
    }
}

/// Index of the quote closing the quoted string that starts `text`.
fn closing_quote(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let quote = bytes[0];
    let mut i = 1;
    while i < bytes.len() {
        let b = bytes[i];
        if quote == b'"' && b == b'\\' {
            i += 2;
            continue;
        }
        if b == quote {
            if quote == b'\'' && bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
                continue;
            }
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Style and length of a single-line scalar, excluding any trailing comment.
fn inline_extent(rest: &str) -> (ScalarStyle, usize) {
    let (style, body_end) = match rest.as_bytes()[0] {
        b'"' => (ScalarStyle::DoubleQuoted, closing_quote(rest).map(|i| i + 1)),
        b'\'' => (ScalarStyle::SingleQuoted, closing_quote(rest).map(|i| i + 1)),
        _ => (ScalarStyle::Plain, None),
    };
    let scan_from = body_end.unwrap_or(0);
    let mut end = rest.len();
    let mut prev_space = false;
    for (i, c) in rest[scan_from..].char_indices() {
        if c == '#' && (prev_space || (i == 0 && scan_from > 0)) {
            end = scan_from + i;
            break;
        }
        prev_space = c == ' ' || c == '\t';
    }
    let len = rest[..end].trim_end().len();
    (style, len.max(body_end.unwrap_or(0)))
}

/// Length of a flow collection that closes on the same line.
fn flow_end(rest: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in rest.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if q == '"' && c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn scalar_value(raw: &str) -> Value {
    serde_yaml::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_mapping() {
        let doc = Document::parse("a:\n  b: 1\n  c: two\nd: true\n").unwrap();
        assert_eq!(doc.to_value(), json!({"a": {"b": 1, "c": "two"}, "d": true}));
    }

    #[test]
    fn test_parse_sequences() {
        let text = "\
tasks:
  - task_key: a
    timeout_seconds: 10
  - task_key: b
tags:
- x
- y
";
        let doc = Document::parse(text).unwrap();
        assert_eq!(
            doc.to_value(),
            json!({
                "tasks": [{"task_key": "a", "timeout_seconds": 10}, {"task_key": "b"}],
                "tags": ["x", "y"]
            })
        );
    }

    #[test]
    fn test_parse_comments_and_quotes() {
        let text = "\
# header
name: \"quoted # not a comment\"  # comment
other: 'it''s'
plain: value # trailing
url: http://example.com/#anchor
";
        let doc = Document::parse(text).unwrap();
        assert_eq!(
            doc.to_value(),
            json!({
                "name": "quoted # not a comment",
                "other": "it's",
                "plain": "value",
                "url": "http://example.com/#anchor"
            })
        );
    }

    #[test]
    fn test_parse_block_and_flow_scalars() {
        let text = "\
script: |
  echo one
  echo two
args: [--verbose, \"x\"]
spec: {a: 1}
empty:
";
        let doc = Document::parse(text).unwrap();
        assert_eq!(
            doc.to_value(),
            json!({
                "script": "echo one\necho two\n",
                "args": ["--verbose", "x"],
                "spec": {"a": 1},
                "empty": null
            })
        );
    }

    #[test]
    fn test_positions() {
        let text = "\
---
resources:
  jobs:
    job1:
      tasks:
        - task_key: a
";
        let doc = Document::parse(text).unwrap();
        let Some(Node::Mapping(m)) = doc.get("/resources/jobs").unwrap() else {
            panic!("expected mapping");
        };
        assert_eq!(m.entries()[0].line(), 4);
        assert_eq!(m.entries()[0].column(), 5);

        let Some(Node::Sequence(s)) = doc.get("/resources/jobs/job1/tasks").unwrap() else {
            panic!("expected sequence");
        };
        assert_eq!(s.items()[0].line(), 6);
        assert_eq!(s.items()[0].column(), 9);
    }

    #[test]
    fn test_empty_document() {
        let doc = Document::parse("# nothing here\n").unwrap();
        assert_eq!(doc.to_value(), Value::Null);
    }

    #[test]
    fn test_rejects_multiline_flow() {
        let err = Document::parse("a: [1,\n  2]\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));
    }

    #[test]
    fn test_rejects_bad_indentation() {
        let err = Document::parse("a: 1\n    b: 2\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }

    #[test]
    fn test_plain_continuation_lines() {
        let doc = Document::parse("description: a long\n  sentence\nnext: 1\n").unwrap();
        assert_eq!(doc.to_value(), json!({"description": "a long sentence", "next": 1}));
    }
}
