use async_trait::async_trait;

use super::types::CompletionRequest;
use crate::core::errors::AppError;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// return the provider name (e.g. "llama_server")
    fn name(&self) -> &str;

    /// check if the completion endpoint is reachable
    async fn health_check(&self) -> Result<bool, AppError>;

    /// single, non-streaming completion of a fully rendered prompt
    async fn complete(&self, request: CompletionRequest) -> Result<String, AppError>;

    /// generate embeddings
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError>;
}
