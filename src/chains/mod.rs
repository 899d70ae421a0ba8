//! Chains pair a prompt template with the language model and project the
//! model's reply onto a [`Record`].

pub mod document;
pub mod judge;
pub mod output;
pub mod product;
pub mod record;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::errors::AppError;
use crate::llm::{CompletionRequest, GenerationSettings, LlmProvider};

pub use document::DocumentChain;
pub use judge::{Judge, Verdict, PASSING_CORRECTNESS};
pub use product::ProductChain;
pub use record::{QuestionType, Record};

#[async_trait]
pub trait Chain: Send + Sync {
    type Input: Send + Sync + ?Sized;
    type Output: Send;

    fn name(&self) -> &'static str;

    /// One inference round for `query`. Each call gets a fresh question id.
    async fn execute(&self, query: &str, input: &Self::Input) -> Result<Self::Output, AppError>;
}

/// The model handle and sampling settings a chain runs with.
#[derive(Clone)]
pub struct ChainModel {
    llm: Arc<dyn LlmProvider>,
    settings: GenerationSettings,
}

impl ChainModel {
    pub fn new(llm: Arc<dyn LlmProvider>, settings: GenerationSettings) -> Self {
        Self { llm, settings }
    }

    /// Single completion call; no retries.
    pub async fn invoke(&self, chain: &str, prompt: String) -> Result<String, AppError> {
        tracing::debug!("{} prompt ({} chars) -> {}", chain, prompt.len(), self.llm.name());
        let request = CompletionRequest::new(prompt).with_settings(&self.settings);
        let raw = self.llm.complete(request).await?;
        tracing::debug!("{} raw output: {}", chain, raw);
        Ok(raw)
    }
}

pub(crate) fn log_execution(chain: &str, query: &str) {
    tracing::info!("Executing {} with query: {}", chain, query);
}

pub(crate) fn log_result(chain: &str, record: &Record) {
    tracing::info!("{} result:\n{}", chain, record.to_pretty_json());
}
