//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::chains::{ChainModel, DocumentChain, Judge, ProductChain};
use crate::chatbot::ChatBot;
use crate::communication::CommunicationHandler;
use crate::console::Console;
use crate::core::errors::AppError;
use crate::knowledge::{KnowledgeBase, ProductCatalog, SqliteVectorStore};
use crate::llm::{CompletionRequest, GenerationSettings, LlmProvider};

const EMBEDDING_DIM: usize = 512;

/// Replays queued completions in order and records every prompt.
/// Embeddings are hashed bags of lower-cased words, so texts sharing words
/// end up close to each other.
pub struct ScriptedLlm {
    completions: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    embed_calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new<I, S>(completions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            completions: Mutex::new(completions.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
            embed_calls: AtomicUsize::new(0),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }
}

fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; EMBEDDING_DIM];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        // FNV-1a
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in word.to_lowercase().bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x100000001b3);
        }
        vector[(hash % EMBEDDING_DIM as u64) as usize] += 1.0;
    }
    vector
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(true)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, AppError> {
        self.prompts.lock().unwrap().push(request.prompt);
        self.completions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::Llm("no scripted completion left".to_string()))
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Ok(inputs.iter().map(|text| bag_of_words(text)).collect())
    }
}

/// Feeds queued lines and captures everything shown to the user.
pub struct ScriptedConsole {
    inputs: VecDeque<String>,
    output: String,
}

impl ScriptedConsole {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            output: String::new(),
        }
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn remaining(&self) -> usize {
        self.inputs.len()
    }
}

#[async_trait]
impl Console for ScriptedConsole {
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>, AppError> {
        self.output.push_str(prompt);
        self.output.push('\n');
        Ok(self.inputs.pop_front())
    }

    async fn say(&mut self, text: &str) -> Result<(), AppError> {
        self.output.push_str(text);
        self.output.push('\n');
        Ok(())
    }
}

pub fn chain_model(llm: Arc<dyn LlmProvider>) -> ChainModel {
    ChainModel::new(llm, GenerationSettings::default())
}

/// Creates a `lamps` table with a unique 1234 and 5678 and a duplicated 9999.
pub async fn seed_lamps_db(path: &Path) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    sqlx::query(
        "CREATE TABLE lamps (
            Bestell_nr INTEGER,
            Bezeichnung_lang TEXT,
            Leistung TEXT,
            Lichtstrom REAL,
            EEL TEXT
        )",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO lamps VALUES
            (1234, 'LED Panel 600x600 neutralweiss', '12W', 1450.5, 'E'),
            (5678, 'LED Strahler GU10', '5W', NULL, NULL),
            (9999, 'Variante A', '7W', 600.0, 'F'),
            (9999, 'Variante B', '7W', 610.0, 'F')",
    )
    .execute(&pool)
    .await
    .unwrap();

    pool.close().await;
}

/// Knowledge base rooted in `dir` with the seeded lamps table and an empty
/// vector store.
pub async fn knowledge_base_in(dir: &Path, llm: Arc<dyn LlmProvider>) -> KnowledgeBase {
    let sql_db = dir.join("sqlite_db.db");
    if !sql_db.exists() {
        seed_lamps_db(&sql_db).await;
    }
    let products = ProductCatalog::open(&sql_db, "lamps", "Bestell_nr")
        .await
        .unwrap();
    let vectors = SqliteVectorStore::with_path(dir.join("vector_store.db"))
        .await
        .unwrap();
    KnowledgeBase::new(products, Arc::new(vectors), llm, dir.join("email_storage"))
}

pub async fn chat_bot_in(dir: &Path, llm: Arc<ScriptedLlm>) -> (Arc<KnowledgeBase>, ChatBot) {
    let kb = Arc::new(knowledge_base_in(dir, llm.clone()).await);
    let bot = ChatBot::new(
        kb.clone(),
        Arc::new(ProductChain::new(chain_model(llm.clone()))),
        Arc::new(DocumentChain::new(chain_model(llm.clone()), kb.clone(), 3)),
        Arc::new(Judge::new(chain_model(llm))),
        Arc::new(CommunicationHandler::new(kb.clone())),
    );
    (kb, bot)
}
