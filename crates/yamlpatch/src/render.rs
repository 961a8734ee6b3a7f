//! Rendering JSON values as YAML fragments.

use crate::document::ScalarStyle;
use serde_json::Value;

/// Single-line rendition of scalars and empty containers.
pub(crate) fn inline(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some("null".to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(string(s)),
        Value::Object(map) if map.is_empty() => Some("{}".to_string()),
        Value::Array(items) if items.is_empty() => Some("[]".to_string()),
        Value::Object(_) | Value::Array(_) => None,
    }
}

/// Like [`inline`], but multi-line strings become literal blocks.
pub(crate) fn leaf(value: &Value, indent: usize) -> Option<String> {
    if let Value::String(s) = value
        && let Some(block) = literal(s, indent)
    {
        return Some(block);
    }
    inline(value)
}

/// Render a replacement scalar in the quoting style of the one it replaces.
pub(crate) fn restyled(value: &Value, style: ScalarStyle, indent: usize) -> Option<String> {
    match (style, value) {
        (ScalarStyle::DoubleQuoted, Value::String(s)) => Some(double_quoted(s)),
        (ScalarStyle::SingleQuoted, Value::String(s)) if !s.contains('\n') => {
            Some(single_quoted(s))
        }
        (ScalarStyle::Literal | ScalarStyle::Folded, Value::String(_)) => leaf(value, indent),
        (ScalarStyle::Flow, Value::Object(_) | Value::Array(_)) => Some(flow(value, false)),
        _ => inline(value),
    }
}

/// Single-line `{...}` / `[...]` rendition. `padded` puts a space inside
/// the outer brackets, as in `{ a: 1 }`.
pub(crate) fn flow(value: &Value, padded: bool) -> String {
    let (members, open, close) = match value {
        Value::Object(map) if !map.is_empty() => (
            map.iter()
                .map(|(k, v)| format!("{}: {}", flow_string(k), flow(v, false)))
                .collect::<Vec<_>>(),
            '{',
            '}',
        ),
        Value::Array(items) if !items.is_empty() => (
            items.iter().map(|v| flow(v, false)).collect(),
            '[',
            ']',
        ),
        Value::String(s) => return flow_string(s),
        _ => return inline(value).unwrap_or_default(),
    };
    if padded {
        format!("{open} {} {close}", members.join(", "))
    } else {
        format!("{open}{}{close}", members.join(", "))
    }
}

fn flow_string(s: &str) -> String {
    if is_plain_safe(s) && !s.contains([',', '[', ']', '{', '}']) {
        s.to_string()
    } else {
        double_quoted(s)
    }
}

/// Mapping key, quoted when plain text would not read back as the same key.
pub(crate) fn key(k: &str) -> String {
    string(k)
}

/// Text following `key:` for a value whose children sit at `indent + 2`.
pub(crate) fn after_key(value: &Value, indent: usize) -> String {
    match leaf(value, indent + 2) {
        Some(text) => format!(" {text}"),
        None => format!("\n{}", block_lines(value, indent + 2).join("\n")),
    }
}

/// Text following the `-` of a sequence item at `indent`.
pub(crate) fn after_dash(value: &Value, indent: usize) -> String {
    if let Some(text) = leaf(value, indent + 2) {
        return format!(" {text}");
    }
    let mut lines = block_lines(value, indent + 2);
    if value.is_object() {
        lines[0] = lines[0].trim_start().to_string();
        format!(" {}", lines.join("\n"))
    } else {
        format!("\n{}", lines.join("\n"))
    }
}

/// A whole document.
pub(crate) fn document(value: &Value) -> String {
    match leaf(value, 0) {
        Some(text) => format!("{text}\n"),
        None => format!("{}\n", block_lines(value, 0).join("\n")),
    }
}

/// Block rendition of a container, one string per output line.
pub(crate) fn block_lines(value: &Value, indent: usize) -> Vec<String> {
    let pad = " ".repeat(indent);
    let mut lines = Vec::new();
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                push_member(&mut lines, format!("{pad}{}:", key(k)), v, indent);
            }
        }
        Value::Array(items) => {
            for v in items {
                match v {
                    Value::Object(map) if !map.is_empty() => {
                        let mut nested = block_lines(v, indent + 2);
                        nested[0] = format!("{pad}- {}", nested[0].trim_start());
                        lines.extend(nested);
                    }
                    _ => push_member(&mut lines, format!("{pad}-"), v, indent),
                }
            }
        }
        _ => lines.push(format!("{pad}{}", leaf(value, indent).unwrap_or_default())),
    }
    lines
}

fn push_member(lines: &mut Vec<String>, head: String, value: &Value, indent: usize) {
    match leaf(value, indent + 2) {
        Some(text) => lines.push(format!("{head} {text}")),
        None => {
            lines.push(head);
            lines.extend(block_lines(value, indent + 2));
        }
    }
}

fn string(s: &str) -> String {
    if is_plain_safe(s) {
        s.to_string()
    } else {
        double_quoted(s)
    }
}

fn double_quoted(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn single_quoted(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// `|` block for strings with embedded newlines, children at `indent`.
fn literal(s: &str, indent: usize) -> Option<String> {
    if !s.contains('\n') {
        return None;
    }
    let (body, header) = match s.strip_suffix('\n') {
        Some(body) if body.ends_with('\n') => return None,
        Some(body) => (body, "|"),
        None => (s, "|-"),
    };
    if body.is_empty() || body.starts_with([' ', '\t', '\n']) || body.contains('\r') {
        return None;
    }
    let pad = " ".repeat(indent);
    let mut out = header.to_string();
    for line in body.split('\n') {
        out.push('\n');
        if !line.is_empty() {
            out.push_str(&pad);
            out.push_str(line);
        }
    }
    Some(out)
}

/// Whether `s` can be written without quotes and still read back as itself.
fn is_plain_safe(s: &str) -> bool {
    if s.is_empty() || s.trim() != s || s.contains(['\n', '\r', '\t']) {
        return false;
    }
    let leading_dash = s.starts_with('-') && s.len() > 1 && !s[1..].starts_with(' ');
    if !leading_dash
        && s.starts_with([
            '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%',
            '@', '`',
        ])
    {
        return false;
    }
    if s.contains(": ") || s.contains(" #") || s.ends_with(':') {
        return false;
    }
    matches!(serde_yaml::from_str::<Value>(s), Ok(Value::String(ref parsed)) if parsed == s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_strings_stay_plain() {
        assert_eq!(inline(&json!("hello")).unwrap(), "hello");
        assert_eq!(inline(&json!("./src/main.py")).unwrap(), "./src/main.py");
        assert_eq!(inline(&json!("--verbose")).unwrap(), "--verbose");
    }

    #[test]
    fn test_ambiguous_strings_are_quoted() {
        assert_eq!(inline(&json!("true")).unwrap(), "\"true\"");
        assert_eq!(inline(&json!("3600")).unwrap(), "\"3600\"");
        assert_eq!(inline(&json!("a: b")).unwrap(), "\"a: b\"");
        assert_eq!(inline(&json!("")).unwrap(), "\"\"");
        assert_eq!(inline(&json!("- item")).unwrap(), "\"- item\"");
    }

    #[test]
    fn test_block_lines_nested() {
        let value = json!({
            "name": "etl",
            "tasks": [{"task_key": "a", "depends_on": [{"task_key": "b"}]}],
            "tags": {}
        });
        assert_eq!(
            block_lines(&value, 2),
            vec![
                "  name: etl",
                "  tasks:",
                "    - task_key: a",
                "      depends_on:",
                "        - task_key: b",
                "  tags: {}",
            ]
        );
    }

    #[test]
    fn test_literal_blocks() {
        assert_eq!(literal("a\nb\n", 4).unwrap(), "|\n    a\n    b");
        assert_eq!(literal("a\n\nb", 2).unwrap(), "|-\n  a\n\n  b");
        assert!(literal("single", 2).is_none());
        assert!(literal(" leading\nspace", 2).is_none());
    }

    #[test]
    fn test_flow() {
        let value = json!({"team": "data", "ids": [1, 2], "note": "a, b", "empty": {}});
        assert_eq!(
            flow(&value, false),
            "{team: data, ids: [1, 2], note: \"a, b\", empty: {}}"
        );
        assert_eq!(flow(&json!(["x"]), true), "[ x ]");
        assert_eq!(flow(&json!([]), true), "[]");
        assert_eq!(flow(&json!("two\nlines"), false), "\"two\\nlines\"");
    }

    #[test]
    fn test_restyled_keeps_quotes() {
        let value = json!("new");
        assert_eq!(
            restyled(&value, ScalarStyle::DoubleQuoted, 0).unwrap(),
            "\"new\""
        );
        assert_eq!(
            restyled(&value, ScalarStyle::SingleQuoted, 0).unwrap(),
            "'new'"
        );
        assert_eq!(restyled(&json!(5), ScalarStyle::DoubleQuoted, 0).unwrap(), "5");
    }
}
