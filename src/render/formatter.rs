//! Response formatter.
//!
//! Renders backend payloads for reading in a terminal:
//! - JSON objects as indented `key: value` lines, in the order received
//! - arrays of objects as numbered blocks, other arrays as bullets
//! - plain text wrapped line by line
//! - errors as a single `[error]` line
//!
//! Text that looks like JSON is decoded first; if decoding fails it is shown
//! as plain text and, in debug mode, the decode failure is reported.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::RenderConfig;

const EMPTY: &str = "(empty)";

// ============================================================================
// Types
// ============================================================================

/// What a backend call produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "body")]
pub enum Payload {
    Structured(Value),
    Text(String),
    Error(String),
}

impl Payload {
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::Error(message.to_string())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

/// Final text shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedOutput {
    text: String,
    is_error: bool,
}

impl RenderedOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// A copy of this output with `lines` placed in front.
    pub fn with_preamble(self, lines: &[String]) -> Self {
        if lines.is_empty() {
            return self;
        }
        let mut text = lines.join("\n");
        if !self.text.is_empty() {
            text.push('\n');
            text.push_str(&self.text);
        }
        Self {
            text,
            is_error: self.is_error,
        }
    }
}

impl std::fmt::Display for RenderedOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// How a text payload was interpreted.
enum Decoded {
    Json(Value),
    Plain,
    /// Looked like JSON but did not parse.
    Ambiguous(String),
}

// ============================================================================
// Formatter
// ============================================================================

/// Renders payloads with a fixed indent and wrap width.
#[derive(Debug, Clone)]
pub struct ResponseFormatter {
    indent_width: usize,
    wrap_width: usize,
}

impl Default for ResponseFormatter {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

impl ResponseFormatter {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            indent_width: config.indent_width.max(1),
            wrap_width: config.wrap_width.max(1),
        }
    }

    /// Render a payload. Output is a pure function of the inputs.
    pub fn render(&self, payload: &Payload, debug: bool) -> RenderedOutput {
        let mut lines = Vec::new();

        let (trailer, is_error) = match payload {
            Payload::Structured(value) => {
                self.render_root(value, &mut lines);
                (format!("[debug] payload: structured {}", shape(value)), false)
            }
            Payload::Text(text) => match decode(text) {
                Decoded::Json(value) => {
                    self.render_root(&value, &mut lines);
                    (format!("[debug] payload: text decoded as {}", shape(&value)), false)
                }
                Decoded::Plain => {
                    self.render_plain(text, &mut lines);
                    let count = text.lines().count();
                    (format!("[debug] payload: plain text ({count} lines)"), false)
                }
                Decoded::Ambiguous(reason) => {
                    tracing::warn!(%reason, "Text looked like JSON but did not decode");
                    self.render_plain(text, &mut lines);
                    (
                        format!("[debug] decode ambiguity: {reason}; rendered as plain text"),
                        false,
                    )
                }
            },
            Payload::Error(message) => {
                lines.push(format!("[error] {message}"));
                ("[debug] payload: error".to_string(), true)
            }
        };

        if debug {
            lines.push(trailer);
        }

        RenderedOutput {
            text: lines.join("\n"),
            is_error,
        }
    }

    fn render_root(&self, value: &Value, out: &mut Vec<String>) {
        match value {
            Value::Object(map) if map.is_empty() => out.push(EMPTY.to_string()),
            Value::Array(items) if items.is_empty() => out.push(EMPTY.to_string()),
            Value::Object(map) => self.render_object(map, 0, out),
            Value::Array(items) => self.render_array(items, 0, out),
            scalar => out.push(scalar_text(scalar)),
        }
    }

    fn render_object(&self, map: &Map<String, Value>, indent: usize, out: &mut Vec<String>) {
        let pad = " ".repeat(indent);
        for (key, value) in map {
            match value {
                Value::Object(inner) if !inner.is_empty() => {
                    out.push(format!("{pad}{key}:"));
                    self.render_object(inner, indent + self.indent_width, out);
                }
                Value::Array(items) if !items.is_empty() => {
                    out.push(format!("{pad}{key}:"));
                    self.render_array(items, indent + self.indent_width, out);
                }
                Value::Object(_) | Value::Array(_) => out.push(format!("{pad}{key}: {EMPTY}")),
                scalar => out.push(format!("{pad}{key}: {}", scalar_text(scalar))),
            }
        }
    }

    fn render_array(&self, items: &[Value], indent: usize, out: &mut Vec<String>) {
        let numbered = items.iter().all(Value::is_object);
        for (i, item) in items.iter().enumerate() {
            let marker = if numbered {
                format!("{}. ", i + 1)
            } else {
                "- ".to_string()
            };
            self.render_item(&marker, item, indent, out);
        }
    }

    /// One list entry: the marker on the first line, the rest hung under it.
    fn render_item(&self, marker: &str, item: &Value, indent: usize, out: &mut Vec<String>) {
        let pad = " ".repeat(indent);
        let mut block = Vec::new();
        match item {
            Value::Object(map) if !map.is_empty() => self.render_object(map, 0, &mut block),
            Value::Array(items) if !items.is_empty() => self.render_array(items, 0, &mut block),
            Value::Object(_) | Value::Array(_) => block.push(EMPTY.to_string()),
            scalar => block.push(scalar_text(scalar)),
        }

        let hang = " ".repeat(marker.chars().count());
        for (n, line) in block.into_iter().enumerate() {
            if n == 0 {
                out.push(format!("{pad}{marker}{line}"));
            } else {
                out.push(format!("{pad}{hang}{line}"));
            }
        }
    }

    fn render_plain(&self, text: &str, out: &mut Vec<String>) {
        // `split` keeps a trailing newline as a final empty line.
        for line in text.split('\n') {
            if line.trim().is_empty() {
                out.push(line.to_string());
                continue;
            }
            out.extend(
                textwrap::wrap(line, self.wrap_width)
                    .into_iter()
                    .map(|l| l.into_owned()),
            );
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn decode(text: &str) -> Decoded {
    let trimmed = text.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) if value.is_object() || value.is_array() => Decoded::Json(value),
        Ok(_) => Decoded::Plain,
        Err(e) if trimmed.starts_with('{') || trimmed.starts_with('[') => {
            Decoded::Ambiguous(e.to_string())
        }
        Err(_) => Decoded::Plain,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Short description of a value's shape for debug trailers.
fn shape(value: &Value) -> String {
    match value {
        Value::Object(map) => format!("object ({} keys)", map.len()),
        Value::Array(items) => format!("array ({} items)", items.len()),
        Value::String(_) => "string".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Null => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(payload: Payload) -> String {
        ResponseFormatter::default()
            .render(&payload, false)
            .into_string()
    }

    #[test]
    fn test_object_keeps_key_order() {
        let out = render(Payload::Structured(json!({
            "title": "Error en login",
            "id": 42,
            "assigned": null
        })));
        assert_eq!(out, "title: Error en login\nid: 42\nassigned: null");
    }

    #[test]
    fn test_nested_object_is_indented() {
        let out = render(json!({"fields": {"System.State": "Active"}}).into());
        assert_eq!(out, "fields:\n  System.State: Active");
    }

    #[test]
    fn test_array_of_objects_is_numbered() {
        let out = render(json!([
            {"id": 1, "name": "Portal"},
            {"id": 2, "name": "Api"}
        ])
        .into());
        assert_eq!(out, "1. id: 1\n   name: Portal\n2. id: 2\n   name: Api");
    }

    #[test]
    fn test_scalar_array_is_bulleted() {
        let out = render(json!({"tags": ["ui", "login"]}).into());
        assert_eq!(out, "tags:\n  - ui\n  - login");
    }

    #[test]
    fn test_empty_collections() {
        assert_eq!(render(json!([]).into()), "(empty)");
        assert_eq!(render(json!({"items": []}).into()), "items: (empty)");
    }

    #[test]
    fn test_text_json_is_decoded() {
        let out = render(Payload::text(r#"{"id": 42, "title": "Error en login"}"#));
        assert!(out.contains("id: 42"));
        assert!(out.contains("title: Error en login"));
    }

    #[test]
    fn test_json_scalar_text_stays_plain() {
        assert_eq!(render(Payload::text("42")), "42");
        assert_eq!(render(Payload::text("\"hola\"")), "\"hola\"");
    }

    #[test]
    fn test_plain_text_wraps_without_losing_words() {
        let formatter = ResponseFormatter::from_config(&RenderConfig {
            indent_width: 2,
            wrap_width: 20,
        });
        let text = "uno dos tres cuatro cinco seis siete ocho nueve diez";
        let out = formatter.render(&Payload::text(text), false);
        assert!(out.as_str().lines().all(|l| l.chars().count() <= 20));
        let rejoined: Vec<&str> = out.as_str().split_whitespace().collect();
        let original: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn test_plain_text_keeps_blank_lines_verbatim() {
        assert_eq!(render(Payload::text("uno\n   \ndos\n")), "uno\n   \ndos\n");
        assert_eq!(render(Payload::text("a\n\nb")), "a\n\nb");
    }

    #[test]
    fn test_decode_ambiguity_falls_back_to_text() {
        let formatter = ResponseFormatter::default();
        let payload = Payload::text("{not json");
        let out = formatter.render(&payload, false);
        assert_eq!(out.as_str(), "{not json");
        assert!(!out.is_error());

        let out = formatter.render(&payload, true);
        assert!(out.as_str().contains("[debug] decode ambiguity"));
    }

    #[test]
    fn test_error_is_never_decoded() {
        let out = ResponseFormatter::default().render(&Payload::Error(r#"{"id": 1}"#.into()), false);
        assert_eq!(out.as_str(), r#"[error] {"id": 1}"#);
        assert!(out.is_error());
    }

    #[test]
    fn test_debug_trailer() {
        let out = ResponseFormatter::default().render(&json!({"a": 1}).into(), true);
        assert_eq!(out.as_str(), "a: 1\n[debug] payload: structured object (1 keys)");
    }

    #[test]
    fn test_render_is_idempotent() {
        let formatter = ResponseFormatter::default();
        let payload = Payload::Structured(json!({"value": [{"id": 1, "tags": ["a"]}]}));
        assert_eq!(
            formatter.render(&payload, true),
            formatter.render(&payload, true)
        );
    }

    #[test]
    fn test_every_top_level_key_is_present() {
        let value = json!({"id": 42, "title": "x", "state": "New", "links": {}, "tags": []});
        let out = render(value.clone().into());
        for key in value.as_object().unwrap().keys() {
            assert!(out.lines().any(|l| l.starts_with(&format!("{key}:"))));
        }
    }

    #[test]
    fn test_preamble() {
        let out = RenderedOutput::new("a: 1").with_preamble(&["[debug] intent".to_string()]);
        assert_eq!(out.as_str(), "[debug] intent\na: 1");
    }
}
