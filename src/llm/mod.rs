pub mod llama_server;
pub mod provider;
pub mod types;

pub use llama_server::LlamaServerProvider;
pub use provider::LlmProvider;
pub use types::{CompletionRequest, GenerationSettings};
