//! Pointer operations expressed as text splices.

use crate::document::{Document, Entry, Item, Node, Scalar, ScalarStyle, parse_root};
use crate::error::{Error, Result};
use crate::pointer;
use crate::render;
use serde_json::{Map, Value};
use std::ops::Range;

/// A JSON Patch style operation addressed by an RFC 6901 pointer.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Insert a member or sequence element; replaces an existing member
    Add { path: String, value: Value },
    /// Overwrite an existing node
    Replace { path: String, value: Value },
    /// Delete an existing node
    Remove { path: String },
}

impl Op {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self::Add {
            path: path.into(),
            value,
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self::Replace {
            path: path.into(),
            value,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::Remove { path: path.into() }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. } | Self::Replace { path, .. } | Self::Remove { path } => path,
        }
    }

    /// Operation name as used in JSON Patch
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Replace { .. } => "replace",
            Self::Remove { .. } => "remove",
        }
    }
}

/// Apply operations in order to `text`, returning the patched text.
///
/// Stops at the first failing operation.
pub fn apply(text: &str, ops: &[Op]) -> Result<String> {
    let mut doc = Document::parse(text)?;
    for op in ops {
        doc.apply(op)?;
    }
    Ok(doc.into_text())
}

struct Splice {
    range: Range<usize>,
    text: String,
}

enum FlowEdit<'a> {
    Replace(&'a str, &'a Value),
    Add(&'a str, &'a Value),
    Remove(&'a str),
}

impl Document {
    /// Apply one operation.
    ///
    /// On error the document is left exactly as it was.
    pub fn apply(&mut self, op: &Op) -> Result<()> {
        let tokens = pointer::parse(op.path())?;
        let splice = match op {
            Op::Add { value, .. } => self.plan_add(&tokens, value)?,
            Op::Replace { value, .. } => self.plan_replace(&tokens, value)?,
            Op::Remove { .. } => self.plan_remove(&tokens)?,
        };

        let mut text = String::with_capacity(self.text.len() + splice.text.len());
        text.push_str(&self.text[..splice.range.start]);
        text.push_str(&splice.text);
        text.push_str(&self.text[splice.range.end..]);

        let root = parse_root(&text)?;
        self.text = text;
        self.root = root;
        Ok(())
    }

    fn plan_replace(&self, tokens: &[String], value: &Value) -> Result<Splice> {
        let Some((last, parent_tokens)) = tokens.split_last() else {
            return Ok(self.replace_root(value));
        };
        let parent = self.parent(parent_tokens)?;
        match parent {
            Node::Mapping(m) => {
                let entry = m
                    .get(last)
                    .ok_or_else(|| Error::NotFound(pointer::join(tokens)))?;
                Ok(self.replace_entry(entry, value))
            }
            Node::Sequence(s) => {
                let index = parse_index(last, tokens)?;
                let item = s
                    .items
                    .get(index)
                    .ok_or_else(|| Error::NotFound(pointer::join(tokens)))?;
                Ok(self.replace_item(item, value))
            }
            Node::Scalar(s) => self.edit_flow(parent_tokens, s, FlowEdit::Replace(last, value)),
        }
    }

    fn plan_add(&self, tokens: &[String], value: &Value) -> Result<Splice> {
        let Some((last, parent_tokens)) = tokens.split_last() else {
            return Ok(self.replace_root(value));
        };
        let parent = self.parent(parent_tokens)?;
        match parent {
            Node::Mapping(m) => {
                if let Some(entry) = m.get(last) {
                    return Ok(self.replace_entry(entry, value));
                }
                let anchor = m.entries.last().map_or(self.text.len(), |e| e.end);
                let text = format!(
                    "\n{}{}:{}",
                    " ".repeat(m.indent),
                    render::key(last),
                    render::after_key(value, m.indent)
                );
                Ok(Splice {
                    range: anchor..anchor,
                    text,
                })
            }
            Node::Sequence(s) => {
                let len = s.items.len();
                let index = if last == "-" {
                    len
                } else {
                    parse_index(last, tokens)?
                };
                if index > len {
                    return Err(Error::IndexOutOfBounds {
                        pointer: pointer::join(parent_tokens),
                        index,
                        len,
                    });
                }
                let item = format!(
                    "{}-{}",
                    " ".repeat(s.indent),
                    render::after_dash(value, s.indent)
                );
                if index == len {
                    let anchor = s.items[len - 1].end;
                    Ok(Splice {
                        range: anchor..anchor,
                        text: format!("\n{item}"),
                    })
                } else {
                    let at = self.line_start(s.items[index].dash);
                    Ok(Splice {
                        range: at..at,
                        text: format!("{item}\n"),
                    })
                }
            }
            Node::Scalar(s) => self.edit_flow(parent_tokens, s, FlowEdit::Add(last, value)),
        }
    }

    fn plan_remove(&self, tokens: &[String]) -> Result<Splice> {
        let Some((last, parent_tokens)) = tokens.split_last() else {
            return Err(Error::Unsupported("removing the document root".to_string()));
        };
        let parent = self.parent(parent_tokens)?;
        match parent {
            Node::Mapping(m) => {
                let pos = m
                    .position(last)
                    .ok_or_else(|| Error::NotFound(pointer::join(tokens)))?;
                if m.entries.len() == 1 {
                    return self.plan_replace(parent_tokens, &Value::Object(Map::new()));
                }
                let entry = &m.entries[pos];
                let start = self.line_start(entry.key_start);
                if pos == 0 && !self.text[start..entry.key_start].trim().is_empty() {
                    // first key of a "- key: value" item: the next key moves onto the dash line
                    return Ok(Splice {
                        range: entry.key_start..m.entries[1].key_start,
                        text: String::new(),
                    });
                }
                Ok(Splice {
                    range: start..self.next_line_start(entry.end),
                    text: String::new(),
                })
            }
            Node::Sequence(s) => {
                let index = parse_index(last, tokens)?;
                let item = s
                    .items
                    .get(index)
                    .ok_or_else(|| Error::NotFound(pointer::join(tokens)))?;
                if s.items.len() == 1 {
                    return self.plan_replace(parent_tokens, &Value::Array(Vec::new()));
                }
                Ok(Splice {
                    range: self.line_start(item.dash)..self.next_line_start(item.end),
                    text: String::new(),
                })
            }
            Node::Scalar(s) => self.edit_flow(parent_tokens, s, FlowEdit::Remove(last)),
        }
    }

    fn parent(&self, parent_tokens: &[String]) -> Result<&Node> {
        self.lookup(parent_tokens)
            .ok_or_else(|| Error::NotFound(pointer::join(parent_tokens)))
    }

    fn replace_root(&self, value: &Value) -> Splice {
        Splice {
            range: 0..self.text.len(),
            text: render::document(value),
        }
    }

    fn replace_entry(&self, entry: &Entry, value: &Value) -> Splice {
        let indent = self.column(entry.key_start);
        if let Node::Scalar(s) = &entry.value
            && let Some(splice) = replace_scalar(s, value, indent + 2)
        {
            return splice;
        }
        Splice {
            range: entry.colon + 1..entry.end,
            text: render::after_key(value, indent),
        }
    }

    fn replace_item(&self, item: &Item, value: &Value) -> Splice {
        let indent = self.column(item.dash);
        if let Node::Scalar(s) = &item.value
            && let Some(splice) = replace_scalar(s, value, indent + 2)
        {
            return splice;
        }
        Splice {
            range: item.dash + 1..item.end,
            text: render::after_dash(value, indent),
        }
    }

    /// Edit a flow collection or null parent as a value. A flow collection is
    /// re-rendered in flow style over its own text only; a null parent
    /// becomes a block container.
    fn edit_flow(&self, parent_tokens: &[String], parent: &Scalar, edit: FlowEdit<'_>) -> Result<Splice> {
        let here = pointer::join(parent_tokens);
        let updated = match (parent.value.clone(), edit) {
            (Value::Null, FlowEdit::Add(token, value)) => {
                if token == "-" || token == "0" {
                    Value::Array(vec![value.clone()])
                } else {
                    let mut map = Map::new();
                    map.insert(token.to_string(), value.clone());
                    Value::Object(map)
                }
            }
            (Value::Object(mut map), FlowEdit::Replace(token, value)) => {
                if !map.contains_key(token) {
                    return Err(Error::NotFound(format!("{here}/{}", pointer::escape(token))));
                }
                map.insert(token.to_string(), value.clone());
                Value::Object(map)
            }
            (Value::Object(mut map), FlowEdit::Add(token, value)) => {
                map.insert(token.to_string(), value.clone());
                Value::Object(map)
            }
            (Value::Object(mut map), FlowEdit::Remove(token)) => {
                if map.shift_remove(token).is_none() {
                    return Err(Error::NotFound(format!("{here}/{}", pointer::escape(token))));
                }
                Value::Object(map)
            }
            (Value::Array(mut items), edit) => {
                let len = items.len();
                match edit {
                    FlowEdit::Replace(token, value) => {
                        let index = flow_index(token, &here)?;
                        let slot = items.get_mut(index).ok_or_else(|| {
                            Error::NotFound(format!("{here}/{token}"))
                        })?;
                        *slot = value.clone();
                    }
                    FlowEdit::Add(token, value) => {
                        let index = if token == "-" {
                            len
                        } else {
                            flow_index(token, &here)?
                        };
                        if index > len {
                            return Err(Error::IndexOutOfBounds {
                                pointer: here,
                                index,
                                len,
                            });
                        }
                        items.insert(index, value.clone());
                    }
                    FlowEdit::Remove(token) => {
                        let index = flow_index(token, &here)?;
                        if index >= len {
                            return Err(Error::NotFound(format!("{here}/{token}")));
                        }
                        items.remove(index);
                    }
                }
                Value::Array(items)
            }
            (Value::Null, _) => return Err(Error::NotFound(here)),
            _ => return Err(Error::NotAContainer(here)),
        };
        if parent.style == ScalarStyle::Flow {
            let raw = &self.text[parent.range.clone()];
            let padded = raw.starts_with("{ ") || raw.starts_with("[ ");
            return Ok(Splice {
                range: parent.range.clone(),
                text: render::flow(&updated, padded),
            });
        }
        self.plan_replace(parent_tokens, &updated)
    }

    fn line_start(&self, offset: usize) -> usize {
        self.text[..offset].rfind('\n').map_or(0, |i| i + 1)
    }

    fn next_line_start(&self, offset: usize) -> usize {
        self.text[offset..]
            .find('\n')
            .map_or(self.text.len(), |i| offset + i + 1)
    }

    fn column(&self, offset: usize) -> usize {
        offset - self.line_start(offset)
    }
}

/// Splice for replacing a scalar in place, when the new value fits on its line.
fn replace_scalar(scalar: &Scalar, value: &Value, indent: usize) -> Option<Splice> {
    if scalar.style == ScalarStyle::Empty {
        let text = render::leaf(value, indent)?;
        return Some(Splice {
            range: scalar.range.clone(),
            text: format!(" {text}"),
        });
    }
    Some(Splice {
        range: scalar.range.clone(),
        text: render::restyled(value, scalar.style, indent)?,
    })
}

fn parse_index(token: &str, tokens: &[String]) -> Result<usize> {
    token
        .parse()
        .map_err(|_| Error::NotFound(pointer::join(tokens)))
}

fn flow_index(token: &str, here: &str) -> Result<usize> {
    token
        .parse()
        .map_err(|_| Error::NotFound(format!("{here}/{token}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const JOB: &str = "\
# Nightly job
resources:
  jobs:
    job1:
      name: nightly   # keep me
      timeout_seconds: 3600
      tasks:
        - task_key: ingest
          notebook_path: ./ingest.py
        - task_key: main
          timeout_seconds: 60

variables:
  env: dev
";

    fn patched(text: &str, op: Op) -> String {
        let mut doc = Document::parse(text).unwrap();
        doc.apply(&op).unwrap();
        doc.into_text()
    }

    #[test]
    fn test_replace_scalar_touches_one_line() {
        let out = patched(
            JOB,
            Op::replace("/resources/jobs/job1/timeout_seconds", json!(7200)),
        );
        assert_eq!(out, JOB.replace("timeout_seconds: 3600", "timeout_seconds: 7200"));
    }

    #[test]
    fn test_replace_keeps_trailing_comment() {
        let out = patched(JOB, Op::replace("/resources/jobs/job1/name", json!("weekly")));
        assert!(out.contains("      name: weekly   # keep me\n"));
    }

    #[test]
    fn test_replace_keeps_double_quotes() {
        let out = patched("a: \"x\"\n", Op::replace("/a", json!("y")));
        assert_eq!(out, "a: \"y\"\n");
    }

    #[test]
    fn test_replace_scalar_with_mapping() {
        let out = patched("a: 1\nb: 2\n", Op::replace("/a", json!({"x": 1, "y": [true]})));
        assert_eq!(out, "a:\n  x: 1\n  y:\n    - true\nb: 2\n");
    }

    #[test]
    fn test_replace_inside_sequence_item() {
        let out = patched(
            JOB,
            Op::replace("/resources/jobs/job1/tasks/1/timeout_seconds", json!(90)),
        );
        assert_eq!(out, JOB.replace("timeout_seconds: 60", "timeout_seconds: 90"));
    }

    #[test]
    fn test_replace_missing_fails_and_leaves_document() {
        let mut doc = Document::parse(JOB).unwrap();
        let err = doc
            .apply(&Op::replace("/resources/jobs/job1/max_retries", json!(3)))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(doc.text(), JOB);
    }

    #[test]
    fn test_add_mapping_entry_after_last() {
        let out = patched(JOB, Op::add("/resources/jobs/job1/max_retries", json!(3)));
        let expected = JOB.replace(
            "          timeout_seconds: 60\n",
            "          timeout_seconds: 60\n      max_retries: 3\n",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn test_add_key_inside_compact_item() {
        let out = patched(
            JOB,
            Op::add("/resources/jobs/job1/tasks/0/max_retries", json!(1)),
        );
        let expected = JOB.replace(
            "          notebook_path: ./ingest.py\n",
            "          notebook_path: ./ingest.py\n          max_retries: 1\n",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn test_add_sequence_append_and_insert() {
        let text = "tags:\n  - a\n  - c\n";
        assert_eq!(
            patched(text, Op::add("/tags/-", json!("d"))),
            "tags:\n  - a\n  - c\n  - d\n"
        );
        assert_eq!(
            patched(text, Op::add("/tags/1", json!("b"))),
            "tags:\n  - a\n  - b\n  - c\n"
        );
        assert_eq!(
            patched(text, Op::add("/tags/2", json!({"k": "v", "n": 1}))),
            "tags:\n  - a\n  - c\n  - k: v\n    n: 1\n"
        );
    }

    #[test]
    fn test_add_out_of_bounds() {
        let mut doc = Document::parse("tags:\n  - a\n").unwrap();
        let err = doc.apply(&Op::add("/tags/5", json!("x"))).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfBounds { index: 5, len: 1, .. }));
    }

    #[test]
    fn test_add_into_empty_value() {
        let out = patched("a:\nb: 1\n", Op::add("/a/x", json!(1)));
        assert_eq!(out, "a:\n  x: 1\nb: 1\n");
    }

    #[test]
    fn test_add_into_flow_mapping() {
        let out = patched("tags: {}\n", Op::add("/tags/team", json!("data")));
        assert_eq!(out, "tags: {team: data}\n");
    }

    #[test]
    fn test_flow_edits_stay_on_their_line() {
        let text = "tags: {team: data, env: dev} # owners\nnext: 1\n";
        assert_eq!(
            patched(text, Op::replace("/tags/team", json!("ml"))),
            "tags: {team: ml, env: dev} # owners\nnext: 1\n"
        );
        assert_eq!(
            patched(text, Op::remove("/tags/team")),
            "tags: {env: dev} # owners\nnext: 1\n"
        );

        let text = "depends: [ a, b ]  # order matters\n";
        assert_eq!(
            patched(text, Op::remove("/depends/1")),
            "depends: [ a ]  # order matters\n"
        );
        assert_eq!(
            patched(text, Op::add("/depends/-", json!("c"))),
            "depends: [ a, b, c ]  # order matters\n"
        );
    }

    #[test]
    fn test_add_element_into_null_value() {
        let out = patched("tasks:\nnext: 1\n", Op::add("/tasks/0", json!({"k": "n"})));
        assert_eq!(out, "tasks:\n  - k: n\nnext: 1\n");
    }

    #[test]
    fn test_add_requires_parent() {
        let mut doc = Document::parse("a: 1\n").unwrap();
        let err = doc.apply(&Op::add("/b/c", json!(1))).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_remove_entry_and_item() {
        let out = patched(JOB, Op::remove("/resources/jobs/job1/timeout_seconds"));
        assert_eq!(out, JOB.replace("      timeout_seconds: 3600\n", ""));

        let out = patched(JOB, Op::remove("/resources/jobs/job1/tasks/0"));
        assert_eq!(
            out,
            JOB.replace(
                "        - task_key: ingest\n          notebook_path: ./ingest.py\n",
                ""
            )
        );
    }

    #[test]
    fn test_remove_first_key_of_compact_item() {
        let out = patched(JOB, Op::remove("/resources/jobs/job1/tasks/1/task_key"));
        assert!(out.contains("        - timeout_seconds: 60\n"));
        assert!(!out.contains("task_key: main"));
    }

    #[test]
    fn test_remove_last_member() {
        assert_eq!(patched("a:\n  b: 1\n", Op::remove("/a/b")), "a: {}\n");
        assert_eq!(patched("a:\n  - 1\n", Op::remove("/a/0")), "a: []\n");
    }

    #[test]
    fn test_apply_list() {
        let out = apply(
            "a: 1\n",
            &[Op::add("/b", json!(2)), Op::replace("/a", json!(0))],
        )
        .unwrap();
        assert_eq!(out, "a: 0\nb: 2\n");
    }

    #[test]
    fn test_literal_block_replaced_as_literal() {
        let out = patched(
            "script: |\n  echo one\nnext: 1\n",
            Op::replace("/script", json!("echo two\necho three\n")),
        );
        assert_eq!(out, "script: |\n  echo two\n  echo three\nnext: 1\n");
    }
}
