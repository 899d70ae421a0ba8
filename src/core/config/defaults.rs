use serde_json::{json, Value};

/// Built-in configuration; `config.yml` and `secrets.yaml` are merged on top.
pub fn default_config() -> Value {
    json!({
        "llm": {
            "base_url": "http://127.0.0.1:8080",
            "api_key": null,
            "temperature": 0.5,
            "top_p": 1.0,
            "repeat_penalty": 1.1,
            "max_tokens": 2048,
            "stop": ["\n\n"],
            "grammar_path": null,
            "timeout_secs": 600
        },
        "embedding": {
            "base_url": "http://127.0.0.1:8090",
            "model": "intfloat/multilingual-e5-large"
        },
        "knowledge": {
            "sql_db": "sqlite_db.db",
            "vector_store": "vector_store.db",
            "email_storage": "email_storage",
            "product_table": "lamps",
            "product_code_column": "Bestell_nr",
            "top_k": 3,
            "chunk_size": 1000,
            "chunk_overlap": 100
        }
    })
}
