//! Splits source documents into overlapping chunks for the vector store.

use super::chunk::{ChunkMetadata, DocumentChunk};

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Chunks `text`; every chunk receives a copy of `metadata` plus its
    /// `start_offset` and `chunk_index`.
    pub fn chunk_document(&self, text: &str, metadata: &ChunkMetadata) -> Vec<DocumentChunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (start_offset, content))| {
                let mut chunk_metadata = metadata.clone();
                chunk_metadata
                    .extra
                    .insert("start_offset".to_string(), start_offset.into());
                chunk_metadata
                    .extra
                    .insert("chunk_index".to_string(), chunk_index.into());
                DocumentChunk::new(content, chunk_metadata)
            })
            .collect()
    }

    /// Character windows of `chunk_size`, advanced by `chunk_size - overlap`,
    /// each cut back to a sentence end when one is near the window's tail.
    fn split(&self, text: &str) -> Vec<(usize, String)> {
        let chunk_size = self.config.chunk_size.max(1);
        let overlap = self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();

        let step = chunk_size.saturating_sub(overlap).max(1);
        let mut start = 0;

        while start < total_chars {
            let end = (start + chunk_size).min(total_chars);
            let chunk_text: String = chars[start..end].iter().collect();

            let final_text = if end < total_chars {
                find_sentence_boundary(&chunk_text)
            } else {
                chunk_text
            };

            let trimmed = final_text.trim();
            if !trimmed.is_empty() {
                chunks.push((start, trimmed.to_string()));
            }

            if end == total_chars {
                break;
            }
            start += step;
        }

        chunks
    }
}

/// Find a good sentence boundary in the last 20% of the chunk.
fn find_sentence_boundary(text: &str) -> String {
    let sentence_endings = [". ", "! ", "? ", ".\n", "!\n", "?\n"];

    let char_count = text.chars().count();
    let search_start = text
        .char_indices()
        .nth((char_count * 80) / 100)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    let search_text = &text[search_start..];

    for ending in sentence_endings.iter() {
        if let Some(pos) = search_text.rfind(ending) {
            let cut_pos = search_start + pos + ending.len();
            return text[..cut_pos].to_string();
        }
    }

    text.to_string()
}
