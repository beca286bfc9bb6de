//! Field extraction from the status document Claude Code pipes to stdin.
//!
//! Every field is optional in practice; missing or malformed fields degrade
//! to placeholders rather than failing the render.

use serde::Serialize;
use serde_json::Value;

use crate::numeric;

pub const UNKNOWN_VALUE: &str = "?";

/// Resolved fields of one status document.
#[derive(Debug, Clone, Serialize)]
pub struct StatusDocument {
    pub model_name: String,
    pub model_id: String,
    pub cwd: String,
    pub project_dir: String,
    pub version: String,
    pub cost_usd: Option<f64>,
    pub duration_ms: u32,
    pub api_duration_ms: u32,
    pub lines_added: u32,
    pub lines_removed: u32,
    pub exceeds_200k_tokens: bool,
    pub session_id: Option<String>,
    pub transcript_path: Option<String>,
}

impl Default for StatusDocument {
    fn default() -> Self {
        Self {
            model_name: UNKNOWN_VALUE.to_string(),
            model_id: UNKNOWN_VALUE.to_string(),
            cwd: UNKNOWN_VALUE.to_string(),
            project_dir: UNKNOWN_VALUE.to_string(),
            version: UNKNOWN_VALUE.to_string(),
            cost_usd: None,
            duration_ms: 0,
            api_duration_ms: 0,
            lines_added: 0,
            lines_removed: 0,
            exceeds_200k_tokens: false,
            session_id: None,
            transcript_path: None,
        }
    }
}

impl StatusDocument {
    pub fn from_value(root: &Value) -> Self {
        let mut doc = Self::default();

        if let Some(value) = str_at(root, &["model", "display_name"]) {
            doc.model_name = sanitize_whitespace(&value);
        }
        if let Some(value) = str_at(root, &["model", "id"]) {
            doc.model_id = sanitize_whitespace(&value);
        }
        if let Some(value) = str_at(root, &["cwd"]) {
            doc.cwd = sanitize_whitespace(&value);
        }
        if let Some(value) = str_at(root, &["workspace", "project_dir"]) {
            doc.project_dir = sanitize_whitespace(&value);
        }
        if let Some(value) = str_at(root, &["version"]) {
            doc.version = sanitize_whitespace(&value);
        }

        doc.cost_usd = float_at(root, &["cost", "total_cost_usd"]);
        doc.duration_ms = u32_at(root, &["cost", "total_duration_ms"]);
        doc.api_duration_ms = u32_at(root, &["cost", "total_api_duration_ms"]);
        doc.lines_added = u32_at(root, &["cost", "total_lines_added"]);
        doc.lines_removed = u32_at(root, &["cost", "total_lines_removed"]);
        doc.exceeds_200k_tokens = root
            .get("exceeds_200k_tokens")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        doc.session_id = str_at(root, &["session_id"]).map(|s| sanitize_whitespace(&s));
        doc.transcript_path = str_at(root, &["transcript_path"]).map(|s| sanitize_whitespace(&s));

        doc
    }

    /// True when at least one of the token-parsing inputs resolved.
    pub fn has_paths(&self) -> bool {
        self.session_id.is_some() || self.transcript_path.is_some()
    }
}

fn value_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cursor = value;
    for key in path {
        cursor = cursor.get(*key)?;
    }
    Some(cursor)
}

fn str_at(value: &Value, path: &[&str]) -> Option<String> {
    value_at(value, path)?.as_str().map(ToString::to_string)
}

fn float_at(value: &Value, path: &[&str]) -> Option<f64> {
    value_at(value, path)?.as_f64()
}

/// Numeric field through the checked conversion; anything out of range for
/// u32 (or non-numeric) reads as 0.
fn u32_at(value: &Value, path: &[&str]) -> u32 {
    value_at(value, path)
        .and_then(Value::as_f64)
        .and_then(|v| numeric::f64_to_u32(v).ok())
        .unwrap_or(0)
}

/// Control whitespace becomes plain spaces so a field can never break the
/// single-line output.
fn sanitize_whitespace(value: &str) -> String {
    value
        .chars()
        .map(|ch| match ch {
            '\n' | '\r' | '\t' => ' ',
            other => other,
        })
        .collect()
}
