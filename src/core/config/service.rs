use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::defaults::default_config;
use super::model::AppConfig;
use super::paths::AppPaths;
use super::validation::validate_config;
use crate::core::errors::AppError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 8] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 2] = ["max_tokens", "tokens"];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("LAMPCHAT_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Defaults, then `config.yml`, then `secrets.yaml`, validated.
    pub fn load_config(&self) -> Result<Value, AppError> {
        let public_config = load_yaml_file(&self.config_path());
        let secrets_config = load_yaml_file(&self.secrets_path());
        let merged = deep_merge(
            &deep_merge(&default_config(), &public_config),
            &secrets_config,
        );
        validate_config(&merged)?;
        Ok(merged)
    }

    pub fn load(&self) -> Result<AppConfig, AppError> {
        let merged = self.load_config()?;
        serde_json::from_value(merged)
            .map_err(|e| AppError::BadRequest(format!("Invalid config: {}", e)))
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

fn load_yaml_file(path: &Path) -> Value {
    if !path.exists() {
        return Value::Object(Map::new());
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Value>(&contents) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => Value::Object(Map::new()),
            Err(err) => {
                tracing::warn!("Ignoring unreadable config {}: {}", path.display(), err);
                Value::Object(Map::new())
            }
        },
        Err(_) => Value::Object(Map::new()),
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service_in(dir: &Path) -> ConfigService {
        let paths = AppPaths::with_data_dir(dir.to_path_buf(), dir.join("data"));
        ConfigService::new(Arc::new(paths))
    }

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "a": 1,
            "b": { "c": 2, "d": 3 },
            "arr": [1, 2]
        });
        let override_value = json!({
            "b": { "c": 99 },
            "arr": [3],
            "e": "x"
        });

        let merged = deep_merge(&base, &override_value);

        assert_eq!(
            merged,
            json!({
                "a": 1,
                "b": { "c": 99, "d": 3 },
                "arr": [3],
                "e": "x"
            })
        );
    }

    #[test]
    fn defaults_load_without_any_files() {
        let tmp = tempfile::tempdir().unwrap();
        let config = service_in(tmp.path()).load().unwrap();

        assert_eq!(config.knowledge.product_table, "lamps");
        assert_eq!(config.knowledge.product_code_column, "Bestell_nr");
        assert_eq!(config.knowledge.top_k, 3);
        assert_eq!(config.llm.stop, vec!["\n\n".to_string()]);
    }

    #[test]
    fn user_config_and_secrets_override_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service_in(tmp.path());
        fs::write(
            tmp.path().join("data").join("config.yml"),
            "knowledge:\n  top_k: 5\nllm:\n  temperature: 0.1\n",
        )
        .unwrap();
        fs::write(service.secrets_path(), "llm:\n  api_key: s3cr3t\n").unwrap();

        let config = service.load().unwrap();
        assert_eq!(config.knowledge.top_k, 5);
        assert_eq!(config.llm.temperature, 0.1);
        assert_eq!(config.llm.api_key.as_deref(), Some("s3cr3t"));
        assert_eq!(config.knowledge.sql_db, "sqlite_db.db");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service_in(tmp.path());
        fs::write(
            tmp.path().join("data").join("config.yml"),
            "knowledge:\n  product_table: \"lamps; DROP TABLE lamps\"\n",
        )
        .unwrap();

        assert!(matches!(service.load(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn redact_sensitive_values_replaces_secrets_only() {
        let input = json!({
            "llm": {
                "api_key": "secret",
                "max_tokens": 42
            },
            "items": [
                { "password": "pw" }
            ]
        });

        let redacted = redact_sensitive_values(&input);

        assert_eq!(
            redacted,
            json!({
                "llm": {
                    "api_key": "****",
                    "max_tokens": 42
                },
                "items": [
                    { "password": "****" }
                ]
            })
        );
    }
}
