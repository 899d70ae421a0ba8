use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use super::chunk::{ChunkMetadata, DocumentChunk, EXPERT_ANSWER_KEYWORD};
use super::product_store::{ColumnInfo, ProductCatalog, ProductLookup};
use super::vector_store::VectorStore;
use crate::chains::record::Record;
use crate::core::errors::AppError;
use crate::llm::LlmProvider;

/// Product table plus document index, and the directory escalations are
/// written to.
pub struct KnowledgeBase {
    products: ProductCatalog,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn LlmProvider>,
    email_storage: PathBuf,
}

/// Snapshot of both stores for the `info` command.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeSummary {
    pub document_count: usize,
    pub expert_answer_count: usize,
    pub sample_document: Option<String>,
    pub product_tables: Vec<String>,
    pub product_table: String,
    pub product_columns: Vec<String>,
}

impl KnowledgeBase {
    pub fn new(
        products: ProductCatalog,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn LlmProvider>,
        email_storage: PathBuf,
    ) -> Self {
        Self {
            products,
            vectors,
            embedder,
            email_storage,
        }
    }

    pub fn email_storage(&self) -> &Path {
        &self.email_storage
    }

    pub async fn lookup_product(&self, code: &str) -> Result<ProductLookup, AppError> {
        self.products.lookup(code).await
    }

    /// The `k` chunks closest to `query` in embedding space.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<DocumentChunk>, AppError> {
        let query_embedding = self.embed_one(query).await?;
        let results = self.vectors.search(&query_embedding, k).await?;
        tracing::debug!(
            "similarity search returned {} chunks (best score {:?})",
            results.len(),
            results.first().map(|r| r.score)
        );
        Ok(results.into_iter().map(|r| r.chunk).collect())
    }

    pub async fn add_document(&self, chunk: &DocumentChunk) -> Result<(), AppError> {
        let embedding = self.embed_one(&chunk.page_content).await?;
        self.vectors.insert(chunk, &embedding).await
    }

    pub async fn add_documents(&self, chunks: Vec<DocumentChunk>) -> Result<usize, AppError> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.page_content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        let count = chunks.len();
        let items: Vec<(DocumentChunk, Vec<f32>)> = chunks.into_iter().zip(embeddings).collect();
        self.vectors.insert_batch(&items).await?;
        Ok(count)
    }

    pub async fn documents(&self, keywords: Option<&str>) -> Result<Vec<DocumentChunk>, AppError> {
        self.vectors.list(keywords).await
    }

    /// Location of the persisted record for an escalated question.
    pub fn persisted_record_path(&self, question_id: &str) -> PathBuf {
        self.email_storage
            .join(question_id)
            .join(format!("output_{}.json", question_id))
    }

    /// Builds the document that records an expert's answer next to the
    /// original question, read back from the escalation bundle.
    pub async fn create_expert_doc(
        &self,
        question_id: &str,
        expert_answer: &str,
        source: &str,
    ) -> Result<DocumentChunk, AppError> {
        let path = self.persisted_record_path(question_id);
        let contents = tokio::fs::read_to_string(&path).await.map_err(|e| {
            AppError::NotFound(format!("persisted record {}: {}", path.display(), e))
        })?;
        let record: Record = serde_json::from_str(&contents)
            .map_err(|e| AppError::parse(format!("{}: {}", path.display(), e)))?;

        let question = record.question.ok_or_else(|| {
            AppError::BadRequest(format!("persisted record {} has no question", question_id))
        })?;

        let creation_date = chrono::Local::now()
            .naive_local()
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string();
        let metadata = ChunkMetadata {
            source: source.to_string(),
            author: Some("Expert".to_string()),
            keywords: Some(EXPERT_ANSWER_KEYWORD.to_string()),
            creation_date: Some(creation_date),
            question_id: Some(question_id.to_string()),
            ..Default::default()
        };

        Ok(DocumentChunk::new(
            format!("Frage: {}. Antwort: {}", question, expert_answer),
            metadata,
        ))
    }

    pub async fn describe(&self) -> Result<KnowledgeSummary, AppError> {
        let document_count = self.vectors.count().await?;
        let expert_answer_count = self.vectors.list(Some(EXPERT_ANSWER_KEYWORD)).await?.len();
        let sample_document = self
            .vectors
            .list(None)
            .await?
            .into_iter()
            .next()
            .map(|chunk| chunk.page_content);
        let product_tables = self.products.table_names().await?;
        let product_columns = self
            .products
            .columns()
            .await?
            .into_iter()
            .map(|ColumnInfo { name, declared_type }| format!("{} {}", name, declared_type))
            .collect();

        Ok(KnowledgeSummary {
            document_count,
            expert_answer_count,
            sample_document,
            product_tables,
            product_table: self.products.table().to_string(),
            product_columns,
        })
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, AppError> {
        self.embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Llm("embedding server returned no vector".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::record::QuestionType;
    use crate::testing::{knowledge_base_in, ScriptedLlm};
    use serde_json::json;

    #[tokio::test]
    async fn similarity_search_finds_the_closest_document() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new(Vec::<String>::new()));
        let kb = knowledge_base_in(tmp.path(), llm).await;

        kb.add_documents(vec![
            DocumentChunk::new("Die Deckenleuchte ist dimmbar", ChunkMetadata::default()),
            DocumentChunk::new("Garantie beträgt fünf Jahre", ChunkMetadata::default()),
            DocumentChunk::new("Schutzart IP65 für Außenbereiche", ChunkMetadata::default()),
        ])
        .await
        .unwrap();

        let hits = kb.similarity_search("Garantie Jahre", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].page_content, "Garantie beträgt fünf Jahre");
    }

    #[tokio::test]
    async fn expert_doc_reads_question_from_the_persisted_record() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new(Vec::<String>::new()));
        let kb = knowledge_base_in(tmp.path(), llm).await;

        let record = Record {
            question_id: "Dabc".to_string(),
            question_type: QuestionType::Document,
            solved: None,
            question: Some("Welche Farbtemperatur hat das Panel?".to_string()),
            answer: Some("Unbekannt".to_string()),
            context: json!([]),
            reasoning_for_correctness: None,
            correctness: Some(1),
        };
        let path = kb.persisted_record_path("Dabc");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, serde_json::to_string_pretty(&record).unwrap()).unwrap();

        let doc = kb.create_expert_doc("Dabc", "4000 K", "reply.txt").await.unwrap();
        assert_eq!(
            doc.page_content,
            "Frage: Welche Farbtemperatur hat das Panel?. Antwort: 4000 K"
        );
        assert_eq!(doc.metadata.author.as_deref(), Some("Expert"));
        assert_eq!(doc.metadata.source, "reply.txt");
        assert_eq!(doc.metadata.question_id.as_deref(), Some("Dabc"));
        assert!(doc.is_expert_answer());
        assert!(doc.metadata.creation_date.is_some());
    }

    #[tokio::test]
    async fn expert_doc_for_unknown_question_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new(Vec::<String>::new()));
        let kb = knowledge_base_in(tmp.path(), llm).await;

        let err = kb.create_expert_doc("Dmissing", "x", "reply.txt").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn describe_reports_both_stores() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new(Vec::<String>::new()));
        let kb = knowledge_base_in(tmp.path(), llm).await;
        kb.add_document(&DocumentChunk::new("Erstes Dokument", ChunkMetadata::default()))
            .await
            .unwrap();

        let summary = kb.describe().await.unwrap();
        assert_eq!(summary.document_count, 1);
        assert_eq!(summary.expert_answer_count, 0);
        assert_eq!(summary.sample_document.as_deref(), Some("Erstes Dokument"));
        assert_eq!(summary.product_tables, vec!["lamps".to_string()]);
        assert_eq!(summary.product_columns[0], "Bestell_nr INTEGER");
    }
}
