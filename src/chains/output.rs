//! Parsing of the JSON object a chain asks the model to emit.

use serde_json::{Map, Value};

use crate::core::errors::AppError;

/// Parses a model reply into a JSON object. The object may be wrapped in a
/// ```` ```json ```` fence; anything else is a parse error. There is no repair.
pub fn parse_structured_output(raw: &str) -> Result<Map<String, Value>, AppError> {
    let body = strip_code_fence(raw.trim());

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(AppError::parse(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(AppError::parse(format!(
            "invalid JSON in model output: {} (output: {:?})",
            e,
            truncate(raw, 200)
        ))),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}
