//! Vector index over document chunks.
//!
//! In-process store using SQLite for chunk text and metadata and
//! brute-force cosine similarity for search.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::chunk::{ChunkMetadata, DocumentChunk};
use crate::core::errors::AppError;

/// Result of a similarity search.
#[derive(Debug, Clone)]
pub struct ChunkSearchResult {
    pub chunk: DocumentChunk,
    /// Similarity score (higher = better).
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert a chunk with its embedding vector.
    async fn insert(&self, chunk: &DocumentChunk, embedding: &[f32]) -> Result<(), AppError>;

    /// Insert multiple chunks in one transaction.
    async fn insert_batch(&self, items: &[(DocumentChunk, Vec<f32>)]) -> Result<(), AppError>;

    /// The `limit` chunks most similar to the query embedding, best first.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, AppError>;

    /// All chunks, optionally restricted to an exact `keywords` value, oldest first.
    async fn list(&self, keywords: Option<&str>) -> Result<Vec<DocumentChunk>, AppError>;

    async fn count(&self) -> Result<usize, AppError>;
}

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub async fn with_path(db_path: PathBuf) -> Result<Self, AppError> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), AppError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS document_chunks (
                chunk_id TEXT PRIMARY KEY,
                page_content TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> DocumentChunk {
        let metadata_str: String = row.get("metadata");
        let metadata = serde_json::from_str::<ChunkMetadata>(&metadata_str).unwrap_or_default();

        DocumentChunk {
            id: row.get("chunk_id"),
            page_content: row.get("page_content"),
            metadata,
        }
    }

    fn metadata_json(chunk: &DocumentChunk) -> Result<String, AppError> {
        serde_json::to_string(&chunk.metadata).map_err(AppError::storage)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn insert(&self, chunk: &DocumentChunk, embedding: &[f32]) -> Result<(), AppError> {
        let blob = Self::serialize_embedding(embedding);
        let metadata_str = Self::metadata_json(chunk)?;

        sqlx::query(
            "INSERT OR REPLACE INTO document_chunks (chunk_id, page_content, metadata, embedding)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&chunk.id)
        .bind(&chunk.page_content)
        .bind(&metadata_str)
        .bind(&blob)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_batch(&self, items: &[(DocumentChunk, Vec<f32>)]) -> Result<(), AppError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for (chunk, embedding) in items {
            let blob = Self::serialize_embedding(embedding);
            let metadata_str = Self::metadata_json(chunk)?;

            sqlx::query(
                "INSERT OR REPLACE INTO document_chunks (chunk_id, page_content, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&chunk.id)
            .bind(&chunk.page_content)
            .bind(&metadata_str)
            .bind(&blob)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, AppError> {
        let rows = sqlx::query(
            "SELECT chunk_id, page_content, metadata, embedding
             FROM document_chunks",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<ChunkSearchResult> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Option<Vec<u8>> = row.get("embedding");
                let embedding_bytes = embedding_bytes.filter(|bytes| !bytes.is_empty())?;
                let stored_emb = Self::deserialize_embedding(&embedding_bytes);
                let score = Self::cosine_similarity(query_embedding, &stored_emb);

                Some(ChunkSearchResult {
                    chunk: Self::row_to_chunk(row),
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit.max(1));

        Ok(scored)
    }

    async fn list(&self, keywords: Option<&str>) -> Result<Vec<DocumentChunk>, AppError> {
        let rows = if let Some(keywords) = keywords {
            sqlx::query(
                "SELECT chunk_id, page_content, metadata
                 FROM document_chunks
                 WHERE json_extract(metadata, '$.keywords') = ?1
                 ORDER BY created_at, rowid",
            )
            .bind(keywords)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT chunk_id, page_content, metadata
                 FROM document_chunks
                 ORDER BY created_at, rowid",
            )
            .fetch_all(&self.pool)
            .await?
        };

        Ok(rows.iter().map(Self::row_to_chunk).collect())
    }

    async fn count(&self) -> Result<usize, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks")
            .fetch_one(&self.pool)
            .await?;

        usize::try_from(count).map_err(AppError::storage)
    }
}
