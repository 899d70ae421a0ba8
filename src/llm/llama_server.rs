use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::CompletionRequest;
use crate::core::config::{EmbeddingConfig, LlmConfig};
use crate::core::errors::AppError;

/// Client for a llama.cpp `llama-server` instance.
///
/// Completions go to the native `/completion` endpoint (which accepts a GBNF
/// grammar); embeddings go to the OpenAI-compatible `/v1/embeddings` endpoint of
/// a second server hosting the embedding model.
#[derive(Clone)]
pub struct LlamaServerProvider {
    base_url: String,
    embedding_base_url: String,
    embedding_model: String,
    api_key: Option<String>,
    client: Client,
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: String,
}

impl LlamaServerProvider {
    pub fn new(llm: &LlmConfig, embedding: &EmbeddingConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(llm.timeout_secs))
            .build()
            .map_err(AppError::llm)?;

        Ok(Self {
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            embedding_base_url: embedding.base_url.trim_end_matches('/').to_string(),
            embedding_model: embedding.model.clone(),
            api_key: llm.api_key.clone().filter(|key| !key.is_empty()),
            client,
        })
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl LlmProvider for LlamaServerProvider {
    fn name(&self) -> &str {
        "llama_server"
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        let url = format!("{}/health", self.base_url);
        let res = self.authorize(self.client.get(&url)).send().await;
        match res {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, AppError> {
        let url = format!("{}/completion", self.base_url);

        let mut body = serde_json::to_value(&request)?;
        if let Some(obj) = body.as_object_mut() {
            obj.insert("stream".to_string(), json!(false));
        }

        let res = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(AppError::llm)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(AppError::Llm(format!(
                "llama-server completion error ({}): {}",
                status, text
            )));
        }

        let payload: CompletionResponse = res.json().await.map_err(AppError::llm)?;
        Ok(payload.content)
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let url = format!("{}/v1/embeddings", self.embedding_base_url);

        let body = json!({
            "model": self.embedding_model,
            "input": inputs,
        });

        let res = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(AppError::llm)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(AppError::Llm(format!("embedding error: {}", text)));
        }

        let payload: Value = res.json().await.map_err(AppError::llm)?;

        let mut embeddings = Vec::new();
        if let Some(data) = payload["data"].as_array() {
            for item in data {
                if let Some(vals) = item["embedding"].as_array() {
                    let vec: Vec<f32> = vals
                        .iter()
                        .filter_map(|v| v.as_f64().map(|f| f as f32))
                        .collect();
                    embeddings.push(vec);
                }
            }
        }

        if embeddings.len() != inputs.len() {
            return Err(AppError::Llm(format!(
                "embedding server returned {} vectors for {} inputs",
                embeddings.len(),
                inputs.len()
            )));
        }

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_trimmed_and_empty_keys_dropped() {
        let llm = LlmConfig {
            base_url: "http://127.0.0.1:8080/".to_string(),
            api_key: Some(String::new()),
            temperature: 0.5,
            top_p: 1.0,
            repeat_penalty: 1.1,
            max_tokens: 16,
            stop: Vec::new(),
            grammar_path: None,
            timeout_secs: 5,
        };
        let embedding = EmbeddingConfig {
            base_url: "http://127.0.0.1:8090//".to_string(),
            model: "e5".to_string(),
        };

        let provider = LlamaServerProvider::new(&llm, &embedding).unwrap();
        assert_eq!(provider.base_url, "http://127.0.0.1:8080");
        assert_eq!(provider.embedding_base_url, "http://127.0.0.1:8090");
        assert!(provider.api_key.is_none());
        assert_eq!(provider.name(), "llama_server");
    }

    #[tokio::test]
    #[ignore]
    async fn live_llama_server_completion() {
        let llm = LlmConfig {
            base_url: "http://127.0.0.1:8080".to_string(),
            api_key: None,
            temperature: 0.5,
            top_p: 1.0,
            repeat_penalty: 1.1,
            max_tokens: 16,
            stop: Vec::new(),
            grammar_path: None,
            timeout_secs: 60,
        };
        let embedding = EmbeddingConfig {
            base_url: "http://127.0.0.1:8090".to_string(),
            model: "intfloat/multilingual-e5-large".to_string(),
        };
        let provider = LlamaServerProvider::new(&llm, &embedding).unwrap();

        match provider.complete(CompletionRequest::new("Hallo")).await {
            Ok(response) => println!("llama-server response: {}", response),
            Err(e) => panic!("Failed to reach llama-server: {}", e),
        }
    }
}
