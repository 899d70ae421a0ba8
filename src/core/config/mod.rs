pub mod defaults;
pub mod model;
pub mod paths;
pub mod service;
pub mod validation;

pub use model::{AppConfig, EmbeddingConfig, KnowledgeConfig, LlmConfig};
pub use paths::AppPaths;
pub use service::ConfigService;
