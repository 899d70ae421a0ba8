use serde::{Deserialize, Serialize};

/// Typed view over the merged configuration tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub knowledge: KnowledgeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub temperature: f64,
    pub top_p: f64,
    pub repeat_penalty: f64,
    pub max_tokens: u32,
    #[serde(default)]
    pub stop: Vec<String>,
    /// GBNF grammar file constraining completions to JSON.
    #[serde(default)]
    pub grammar_path: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    pub sql_db: String,
    pub vector_store: String,
    pub email_storage: String,
    pub product_table: String,
    pub product_code_column: String,
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}
