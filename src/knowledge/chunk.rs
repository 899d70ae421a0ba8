use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keyword attached to documents written back from expert replies.
pub const EXPERT_ANSWER_KEYWORD: &str = "expert_answer";

/// A unit of retrievable text with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub page_content: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(
        rename = "creationDate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub creation_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    /// Anything else the ingesting side recorded (page numbers, offsets, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DocumentChunk {
    pub fn new(page_content: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            page_content: page_content.into(),
            metadata,
        }
    }

    pub fn is_expert_answer(&self) -> bool {
        self.metadata.keywords.as_deref() == Some(EXPERT_ANSWER_KEYWORD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_round_trips_with_camel_case_date_and_extras() {
        let value = json!({
            "id": "c1",
            "page_content": "LED Panel 600x600",
            "metadata": {
                "source": "katalog.pdf",
                "author": "SME",
                "keywords": "panel",
                "creationDate": "2024-01-01T00:00:00",
                "page": 4
            }
        });

        let chunk: DocumentChunk = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(chunk.metadata.creation_date.as_deref(), Some("2024-01-01T00:00:00"));
        assert_eq!(chunk.metadata.extra.get("page"), Some(&json!(4)));
        assert!(!chunk.is_expert_answer());
        assert_eq!(serde_json::to_value(&chunk).unwrap(), value);
    }
}
