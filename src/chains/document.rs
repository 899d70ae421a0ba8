use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::output::parse_structured_output;
use super::record::{QuestionType, Record};
use super::{log_execution, log_result, Chain, ChainModel};
use crate::core::errors::AppError;
use crate::knowledge::{DocumentChunk, KnowledgeBase};
use crate::templates::{self, DOCUMENT_PROMPT, DOCUMENT_RESPONSE};

/// Keys the model may put its answer under, in order of preference.
pub const ANSWER_KEY_SYNONYMS: &[&str] = &["antwort", "answer"];

/// Answers free-text questions from retrieved document chunks.
pub struct DocumentChain {
    model: ChainModel,
    knowledge: Arc<KnowledgeBase>,
    top_k: usize,
}

impl DocumentChain {
    pub fn new(model: ChainModel, knowledge: Arc<KnowledgeBase>, top_k: usize) -> Self {
        Self {
            model,
            knowledge,
            top_k: top_k.max(1),
        }
    }

    fn prompt(&self, query: &str, chunks: &[DocumentChunk]) -> String {
        let context = chunks
            .iter()
            .map(|chunk| chunk.page_content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let schema = templates::format_instructions(DOCUMENT_RESPONSE);
        templates::render(
            DOCUMENT_PROMPT,
            &[
                ("question", query),
                ("context", &context),
                ("schema", &schema),
            ],
        )
    }
}

/// Lower-cases keys and moves the answer under its canonical key.
/// `None` when no answer key is present.
fn normalize_output(output: Map<String, Value>) -> Option<Map<String, Value>> {
    let mut lowered: Map<String, Value> = output
        .into_iter()
        .map(|(key, value)| (key.to_lowercase(), value))
        .collect();

    let answer = ANSWER_KEY_SYNONYMS
        .iter()
        .find_map(|key| lowered.get(*key).filter(|v| !v.is_null()).cloned())?;
    lowered.insert("answer".to_string(), answer);
    Some(lowered)
}

#[async_trait]
impl Chain for DocumentChain {
    type Input = ();
    /// `None` when the model's reply could not be parsed or carries no answer.
    type Output = Option<Record>;

    fn name(&self) -> &'static str {
        "DocumentChain"
    }

    async fn execute(&self, query: &str, _input: &()) -> Result<Option<Record>, AppError> {
        log_execution(self.name(), query);

        let chunks = self.knowledge.similarity_search(query, self.top_k).await?;
        let prompt = self.prompt(query, &chunks);
        let raw = self.model.invoke(self.name(), prompt).await?;

        let output = match parse_structured_output(&raw) {
            Ok(output) => output,
            Err(e) => {
                tracing::error!("{} could not parse model output: {}", self.name(), e);
                return Ok(None);
            }
        };
        let Some(output) = normalize_output(output) else {
            tracing::error!(
                "{} output has none of the answer keys {:?}",
                self.name(),
                ANSWER_KEY_SYNONYMS
            );
            return Ok(None);
        };

        let mut record = Record::from_model_output(
            QuestionType::Document.new_question_id(),
            QuestionType::Document,
            &output,
            serde_json::to_value(&chunks)?,
        );
        record.question = Some(query.to_string());

        log_result(self.name(), &record);
        Ok(Some(record))
    }
}
