pub mod base;
pub mod chunk;
pub mod chunking;
pub mod product_store;
pub mod vector_store;

pub use base::{KnowledgeBase, KnowledgeSummary};
pub use chunk::{ChunkMetadata, DocumentChunk, EXPERT_ANSWER_KEYWORD};
pub use chunking::{ChunkerConfig, TextChunker};
pub use product_store::{ProductCatalog, ProductInfo, ProductLookup};
pub use vector_store::{SqliteVectorStore, VectorStore};
