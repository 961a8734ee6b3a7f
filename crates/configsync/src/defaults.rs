//! Recognition of platform-injected defaults.
//!
//! After a deploy the platform fills in fields the user never wrote. When the
//! planner reports such a field as new, writing it back would only add noise,
//! so the reconciler checks the remote value against a table of known
//! defaults first.
//!
//! Patterns are dotted field paths where `*` matches any one segment and
//! `name[*]` matches any element of the sequence `name`:
//!
//! ```text
//! resources.jobs.*.tasks[*].run_if
//! ```

use crate::error::{Error, Result};
use crate::path::{FieldPath, Segment};
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSegment {
    Key(String),
    AnyElement,
    Any,
}

/// A field path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    text: String,
    segments: Vec<PatternSegment>,
}

impl Pattern {
    pub fn parse(text: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for part in text.split('.') {
            match part {
                "" => return Err(Error::invalid_path(text, "empty pattern segment")),
                "*" => segments.push(PatternSegment::Any),
                _ => {
                    let (name, element) = match part.strip_suffix("[*]") {
                        Some(name) => (name, true),
                        None => (part, false),
                    };
                    if name.is_empty() || name.contains(['[', ']']) {
                        return Err(Error::invalid_path(text, "invalid pattern segment"));
                    }
                    segments.push(PatternSegment::Key(name.to_string()));
                    if element {
                        segments.push(PatternSegment::AnyElement);
                    }
                }
            }
        }
        Ok(Self {
            text: text.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn matches(&self, path: &FieldPath) -> bool {
        self.segments.len() == path.len()
            && self
                .segments
                .iter()
                .zip(path.segments())
                .all(|(pattern, segment)| match (pattern, segment) {
                    (PatternSegment::Any, _) => true,
                    (PatternSegment::Key(k), Segment::Key(key)) => k == key,
                    (PatternSegment::AnyElement, Segment::Index(_) | Segment::Select { .. }) => {
                        true
                    }
                    _ => false,
                })
    }
}

/// How a matched remote value is compared.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    /// Always a default
    Always,
    /// Default when absent, null, zero, false or the empty string
    ZeroOrAbsent,
    /// Default when an empty container or equal to the given record
    EmptyOrDefault(Value),
    /// Default when equal to the given value
    Equals(Value),
}

impl Comparison {
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Comparison::Always => true,
            Comparison::ZeroOrAbsent => is_zero(value),
            Comparison::EmptyOrDefault(default) => match value {
                None | Some(Value::Null) => true,
                Some(Value::Object(map)) if map.is_empty() => true,
                Some(Value::Array(items)) if items.is_empty() => true,
                Some(v) => values_equal(v, default),
            },
            Comparison::Equals(expected) => value.is_some_and(|v| values_equal(v, expected)),
        }
    }
}

/// A pattern and its comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultRule {
    pub pattern: Pattern,
    pub comparison: Comparison,
}

/// Ordered default and reset tables.
#[derive(Debug, Clone, Default)]
pub struct DefaultRules {
    skip: Vec<DefaultRule>,
    reset: Vec<(Pattern, Value)>,
}

impl DefaultRules {
    /// Tables with no rules at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Defaults the platform is known to inject.
    pub fn builtin() -> Self {
        let mut rules = Self::empty();
        for (pattern, comparison) in builtin_skip() {
            match Pattern::parse(pattern) {
                Ok(pattern) => rules.skip.push(DefaultRule {
                    pattern,
                    comparison,
                }),
                Err(err) => log::error!("builtin default rule dropped: {err}"),
            }
        }
        for (pattern, value) in builtin_reset() {
            match Pattern::parse(pattern) {
                Ok(pattern) => rules.reset.push((pattern, value)),
                Err(err) => log::error!("builtin reset rule dropped: {err}"),
            }
        }
        rules
    }

    /// Put `rules` ahead of the existing ones.
    #[must_use]
    pub fn with_overrides(mut self, rules: Vec<DefaultRule>) -> Self {
        self.skip.splice(0..0, rules);
        self
    }

    /// Put reset `values` ahead of the existing ones.
    #[must_use]
    pub fn with_resets(mut self, values: Vec<(Pattern, Value)>) -> Self {
        self.reset.splice(0..0, values);
        self
    }

    /// Whether `value` at `path` is a platform default. The first rule whose
    /// pattern matches decides.
    pub fn should_skip(&self, path: &FieldPath, value: Option<&Value>) -> bool {
        self.skip
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .is_some_and(|rule| rule.comparison.matches(value))
    }

    /// Sentinel to write instead of clearing the field at `path`.
    pub fn reset_value(&self, path: &FieldPath) -> Option<&Value> {
        self.reset
            .iter()
            .find(|(pattern, _)| pattern.matches(path))
            .map(|(_, value)| value)
    }
}

fn builtin_skip() -> Vec<(&'static str, Comparison)> {
    vec![
        ("resources.*.*.id", Comparison::Always),
        ("resources.*.*.url", Comparison::Always),
        ("resources.*.*.modified_status", Comparison::Always),
        ("resources.jobs.*.run_as", Comparison::Always),
        ("resources.jobs.*.deployment", Comparison::Always),
        ("resources.jobs.*.edit_mode", Comparison::Always),
        ("resources.jobs.*.format", Comparison::Equals(json!("MULTI_TASK"))),
        ("resources.jobs.*.max_concurrent_runs", Comparison::Equals(json!(1))),
        ("resources.jobs.*.timeout_seconds", Comparison::ZeroOrAbsent),
        (
            "resources.jobs.*.email_notifications",
            Comparison::EmptyOrDefault(json!({"no_alert_for_skipped_runs": false})),
        ),
        (
            "resources.jobs.*.webhook_notifications",
            Comparison::EmptyOrDefault(json!({})),
        ),
        (
            "resources.jobs.*.queue",
            Comparison::EmptyOrDefault(json!({"enabled": true})),
        ),
        ("resources.jobs.*.tasks[*].run_if", Comparison::Equals(json!("ALL_SUCCESS"))),
        ("resources.jobs.*.tasks[*].timeout_seconds", Comparison::ZeroOrAbsent),
        ("resources.jobs.*.tasks[*].disabled", Comparison::ZeroOrAbsent),
        (
            "resources.jobs.*.tasks[*].email_notifications",
            Comparison::EmptyOrDefault(json!({})),
        ),
        (
            "resources.jobs.*.tasks[*].webhook_notifications",
            Comparison::EmptyOrDefault(json!({})),
        ),
        (
            "resources.jobs.*.tasks[*].notification_settings",
            Comparison::EmptyOrDefault(json!({})),
        ),
        ("resources.pipelines.*.deployment", Comparison::Always),
        ("resources.pipelines.*.storage", Comparison::Always),
        ("resources.pipelines.*.channel", Comparison::Equals(json!("CURRENT"))),
        ("resources.pipelines.*.edition", Comparison::Equals(json!("ADVANCED"))),
        ("resources.pipelines.*.photon", Comparison::ZeroOrAbsent),
        ("resources.pipelines.*.development", Comparison::ZeroOrAbsent),
        (
            "resources.model_serving_endpoints.*.route_optimized",
            Comparison::ZeroOrAbsent,
        ),
    ]
}

fn builtin_reset() -> Vec<(&'static str, Value)> {
    vec![
        ("resources.clusters.*.autotermination_minutes", json!(0)),
        ("resources.jobs.*.trigger.pause_status", json!("UNPAUSED")),
        ("resources.jobs.*.schedule.pause_status", json!("UNPAUSED")),
        (
            "resources.model_serving_endpoints.*.ai_gateway.guardrails.input.pii.behavior",
            json!("NONE"),
        ),
    ]
}

fn is_zero(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => {
            n.as_i64() == Some(0)
                || n.as_u64() == Some(0)
                || n.as_f64().is_some_and(|f| f.abs() < f64::EPSILON)
        }
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => false,
    }
}

/// Deep equality where numbers compare by value, so `1` equals `1.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x == y
                || x
                    .as_f64()
                    .zip(y.as_f64())
                    .is_some_and(|(x, y)| (x - y).abs() < f64::EPSILON)
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => objects_equal(x, y),
        _ => a == b,
    }
}

fn objects_equal(x: &Map<String, Value>, y: &Map<String, Value>) -> bool {
    x.len() == y.len()
        && x
            .iter()
            .all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
}
