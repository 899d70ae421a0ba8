use serde_json::{Map, Value};

use crate::core::errors::AppError;

pub fn validate_config(config: &Value) -> Result<(), AppError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_required_string_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.api_key", "api_key")?;
        validate_f64_field(llm, "llm.temperature", "temperature", 0.0, 2.0)?;
        validate_f64_field(llm, "llm.top_p", "top_p", 0.0, 1.0)?;
        validate_f64_field(llm, "llm.repeat_penalty", "repeat_penalty", 0.0, 10.0)?;
        validate_u64_field(llm, "llm.max_tokens", "max_tokens", 1, 1_000_000)?;
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 86_400)?;
        validate_string_array_field(llm, "llm.stop", "stop")?;
        validate_optional_string_field(llm, "llm.grammar_path", "grammar_path")?;
    }

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_required_string_field(embedding, "embedding.base_url", "base_url")?;
        validate_required_string_field(embedding, "embedding.model", "model")?;
    }

    if let Some(knowledge) = expect_optional_object(root, "knowledge")? {
        validate_required_string_field(knowledge, "knowledge.sql_db", "sql_db")?;
        validate_required_string_field(knowledge, "knowledge.vector_store", "vector_store")?;
        validate_required_string_field(knowledge, "knowledge.email_storage", "email_storage")?;
        validate_identifier_field(knowledge, "knowledge.product_table", "product_table")?;
        validate_identifier_field(
            knowledge,
            "knowledge.product_code_column",
            "product_code_column",
        )?;
        validate_u64_field(knowledge, "knowledge.top_k", "top_k", 1, 100)?;
        validate_u64_field(knowledge, "knowledge.chunk_size", "chunk_size", 1, 1_000_000)?;
        validate_u64_field(
            knowledge,
            "knowledge.chunk_overlap",
            "chunk_overlap",
            0,
            1_000_000,
        )?;
    }

    Ok(())
}

/// True for names that can be interpolated into SQL as a quoted identifier.
pub fn is_sql_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, AppError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), AppError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(AppError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), AppError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(AppError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_required_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), AppError> {
    let value = section.get(key).ok_or_else(|| {
        AppError::BadRequest(format!("Invalid config at '{}': value is required", path))
    })?;
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.trim().is_empty() {
        return Err(AppError::BadRequest(format!(
            "Invalid config at '{}': value cannot be empty",
            path
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), AppError> {
    match section.get(key) {
        None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
        Some(_) => Err(config_type_error(path, "string")),
    }
}

fn validate_identifier_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), AppError> {
    validate_required_string_field(section, path, key)?;
    let text = section.get(key).and_then(|v| v.as_str()).unwrap_or_default();
    if !is_sql_identifier(text) {
        return Err(AppError::BadRequest(format!(
            "Invalid config at '{}': '{}' is not a valid SQL identifier",
            path, text
        )));
    }
    Ok(())
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), AppError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> AppError {
    AppError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::defaults::default_config;
    use serde_json::json;

    #[test]
    fn defaults_are_valid() {
        validate_config(&default_config()).unwrap();
    }

    #[test]
    fn sql_identifiers() {
        assert!(is_sql_identifier("lamps"));
        assert!(is_sql_identifier("Bestell_nr"));
        assert!(!is_sql_identifier("1lamps"));
        assert!(!is_sql_identifier("lamps\"; --"));
        assert!(!is_sql_identifier(""));
    }

    #[test]
    fn rejects_out_of_range_and_mistyped_values() {
        let err = validate_config(&json!({ "knowledge": { "sql_db": "a", "vector_store": "b",
            "email_storage": "c", "product_table": "lamps", "product_code_column": "nr",
            "top_k": 0 } }))
        .unwrap_err();
        assert!(err.to_string().contains("knowledge.top_k"));

        let err = validate_config(&json!({ "llm": { "base_url": "http://x", "stop": [1] } }))
            .unwrap_err();
        assert!(err.to_string().contains("llm.stop[0]"));
    }
}
