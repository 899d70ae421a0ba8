use std::sync::Arc;

use crate::chains::{ChainModel, DocumentChain, Judge, ProductChain};
use crate::chatbot::ChatBot;
use crate::communication::CommunicationHandler;
use crate::core::config::{AppConfig, AppPaths, ConfigService};
use crate::evaluation::{Evaluator, QaGenerator};
use crate::knowledge::{ChunkerConfig, KnowledgeBase, ProductCatalog, SqliteVectorStore, TextChunker};
use crate::llm::{GenerationSettings, LlamaServerProvider, LlmProvider};

pub mod error;

use error::InitializationError;

/// Everything a command needs, built once at startup.
///
/// Holds:
/// - Paths and the loaded configuration
/// - The language model provider
/// - The knowledge base (product table, vector store, escalation storage)
/// - The chains, the judge and the communication handler built on top
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: AppConfig,
    pub llm: Arc<dyn LlmProvider>,
    pub knowledge: Arc<KnowledgeBase>,
    pub product_chain: Arc<ProductChain>,
    pub document_chain: Arc<DocumentChain>,
    pub judge: Arc<Judge>,
    pub communication: Arc<CommunicationHandler>,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// 1. Loading and validating configuration
    /// 2. Creating the LLM provider (and reading the output grammar, if any)
    /// 3. Opening the product table and the vector store
    /// 4. Building chains, judge and communication handler
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Self, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let llm: Arc<dyn LlmProvider> = Arc::new(
            LlamaServerProvider::new(&settings.llm, &settings.embedding)
                .map_err(|e| InitializationError::Llm(e.into()))?,
        );

        let grammar = match &settings.llm.grammar_path {
            Some(path) => {
                let path = paths.resolve(path);
                let grammar = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    InitializationError::Llm(anyhow::anyhow!(
                        "cannot read grammar {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Some(grammar)
            }
            None => None,
        };
        let model = ChainModel::new(
            llm.clone(),
            GenerationSettings::from_config(&settings.llm, grammar),
        );

        let knowledge_config = &settings.knowledge;
        let products = ProductCatalog::open(
            &paths.resolve(&knowledge_config.sql_db),
            &knowledge_config.product_table,
            &knowledge_config.product_code_column,
        )
        .await
        .map_err(|e| InitializationError::KnowledgeBase(e.into()))?;
        let vectors = SqliteVectorStore::with_path(paths.resolve(&knowledge_config.vector_store))
            .await
            .map_err(|e| InitializationError::KnowledgeBase(e.into()))?;

        let knowledge = Arc::new(KnowledgeBase::new(
            products,
            Arc::new(vectors),
            llm.clone(),
            paths.resolve(&knowledge_config.email_storage),
        ));

        let product_chain = Arc::new(ProductChain::new(model.clone()));
        let document_chain = Arc::new(DocumentChain::new(
            model.clone(),
            knowledge.clone(),
            knowledge_config.top_k,
        ));
        let judge = Arc::new(Judge::new(model));
        let communication = Arc::new(CommunicationHandler::new(knowledge.clone()));

        tracing::info!(
            "Initialized with {} at {}",
            llm.name(),
            settings.llm.base_url
        );

        Ok(AppState {
            paths,
            config,
            settings,
            llm,
            knowledge,
            product_chain,
            document_chain,
            judge,
            communication,
        })
    }

    pub fn chat_bot(&self) -> ChatBot {
        ChatBot::new(
            self.knowledge.clone(),
            self.product_chain.clone(),
            self.document_chain.clone(),
            self.judge.clone(),
            self.communication.clone(),
        )
    }

    pub fn evaluator(&self) -> Evaluator {
        let generator = QaGenerator::new(ChainModel::new(
            self.llm.clone(),
            GenerationSettings::from_config(&self.settings.llm, None),
        ));
        Evaluator::new(
            self.knowledge.clone(),
            generator,
            self.document_chain.clone(),
            self.judge.clone(),
        )
    }

    pub fn chunker(&self) -> TextChunker {
        TextChunker::new(ChunkerConfig {
            chunk_size: self.settings.knowledge.chunk_size,
            chunk_overlap: self.settings.knowledge.chunk_overlap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::seed_lamps_db;

    #[tokio::test]
    async fn initializes_from_data_dir_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Arc::new(AppPaths::with_data_dir(
            tmp.path().to_path_buf(),
            tmp.path().join("data"),
        ));
        seed_lamps_db(&paths.resolve("sqlite_db.db")).await;

        let state = AppState::initialize(paths.clone()).await.unwrap();

        assert_eq!(state.settings.knowledge.top_k, 3);
        assert_eq!(state.llm.name(), "llama_server");
        assert_eq!(
            state.knowledge.email_storage(),
            paths.resolve("email_storage").as_path()
        );
        assert!(paths.resolve("vector_store.db").exists());
    }

    #[tokio::test]
    async fn missing_product_database_fails_initialization() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Arc::new(AppPaths::with_data_dir(
            tmp.path().to_path_buf(),
            tmp.path().join("data"),
        ));

        let err = AppState::initialize(paths).await.err().unwrap();
        assert!(matches!(err, InitializationError::KnowledgeBase(_)));
    }
}
