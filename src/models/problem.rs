//! ProblemDetails error envelope

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Title used for every error the audit API emits.
pub const DEFAULT_PROBLEM_TITLE: &str = "An unexpected error occurred";

/// Error body emitted for every non-2xx API response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type", default)]
    pub problem_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub instance: Option<String>,
    /// Field-level messages, when the failure has them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl ProblemDetails {
    pub fn new(status: u16, detail: impl Into<String>) -> Self {
        Self {
            problem_type: None,
            title: Some(DEFAULT_PROBLEM_TITLE.to_string()),
            status: Some(status),
            detail: Some(detail.into()),
            instance: None,
            errors: None,
        }
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Read the ProblemDetails members out of an arbitrary JSON error body.
    ///
    /// Returns `None` when the body is not a JSON object. Members of the wrong
    /// type are treated as absent.
    pub fn from_value(body: &Value) -> Option<Self> {
        let obj = body.as_object()?;
        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
        Some(Self {
            problem_type: text("type"),
            title: text("title"),
            status: obj
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok()),
            detail: text("detail"),
            instance: text("instance"),
            errors: obj.get("errors").and_then(flatten_messages),
        })
    }
}

/// Collect error messages from a list of strings or a `{ field: [messages] }` map.
pub fn flatten_messages(value: &Value) -> Option<Vec<String>> {
    let mut out = Vec::new();
    match value {
        Value::Array(items) => collect_strings(items, &mut out),
        Value::Object(map) => {
            for entry in map.values() {
                match entry {
                    Value::Array(items) => collect_strings(items, &mut out),
                    Value::String(s) => out.push(s.clone()),
                    _ => {}
                }
            }
        }
        Value::String(s) => out.push(s.clone()),
        _ => return None,
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn collect_strings(items: &[Value], out: &mut Vec<String>) {
    out.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
}
