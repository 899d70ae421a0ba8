//! Synthetic evaluation: generate factoid questions from stored chunks,
//! answer them through the document path and grade the answers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chains::output::parse_structured_output;
use crate::chains::{Chain, ChainModel, DocumentChain, Judge};
use crate::core::errors::AppError;
use crate::knowledge::{DocumentChunk, KnowledgeBase};
use crate::templates::{self, QA_GENERATION_PROMPT, QA_RESPONSE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

pub struct QaGenerator {
    model: ChainModel,
}

impl QaGenerator {
    pub fn new(model: ChainModel) -> Self {
        Self { model }
    }

    /// A question/answer pair grounded in `chunk`, or `None` when the
    /// model's reply lacks either field or does not parse.
    pub async fn generate(&self, chunk: &DocumentChunk) -> Result<Option<QaPair>, AppError> {
        let schema = templates::format_instructions(QA_RESPONSE);
        let prompt = templates::render(
            QA_GENERATION_PROMPT,
            &[("schema", &schema), ("context", &chunk.page_content)],
        );
        let raw = self.model.invoke("QaGenerator", prompt).await?;

        let output = match parse_structured_output(&raw) {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("QA generation for chunk {} failed: {}", chunk.id, e);
                return Ok(None);
            }
        };
        let field = |name: &str| {
            output
                .get(name)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Ok(field("question")
            .zip(field("answer"))
            .map(|(question, answer)| QaPair { question, answer }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationItem {
    pub chunk_id: String,
    pub source: String,
    pub question: String,
    pub reference_answer: String,
    pub generated_answer: Option<String>,
    pub correctness: Option<i64>,
    pub escalated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub created_at: String,
    pub requested_samples: usize,
    pub items: Vec<EvaluationItem>,
    pub mean_correctness: Option<f64>,
    pub escalation_count: usize,
}

impl EvaluationReport {
    fn new(requested_samples: usize, items: Vec<EvaluationItem>) -> Self {
        let grades: Vec<i64> = items.iter().filter_map(|item| item.correctness).collect();
        let mean_correctness = if grades.is_empty() {
            None
        } else {
            Some(grades.iter().sum::<i64>() as f64 / grades.len() as f64)
        };
        let escalation_count = items.iter().filter(|item| item.escalated).count();

        Self {
            created_at: chrono::Local::now().to_rfc3339(),
            requested_samples,
            items,
            mean_correctness,
            escalation_count,
        }
    }

    /// Writes `evaluation_<timestamp>.json` into `dir`.
    pub async fn write_to(&self, dir: &Path) -> Result<PathBuf, AppError> {
        tokio::fs::create_dir_all(dir).await?;
        let file_name = format!(
            "evaluation_{}.json",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        let path = dir.join(file_name);
        tokio::fs::write(&path, serde_json::to_string_pretty(self)?).await?;
        Ok(path)
    }
}

pub struct Evaluator {
    knowledge: Arc<KnowledgeBase>,
    generator: QaGenerator,
    document_chain: Arc<DocumentChain>,
    judge: Arc<Judge>,
}

impl Evaluator {
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        generator: QaGenerator,
        document_chain: Arc<DocumentChain>,
        judge: Arc<Judge>,
    ) -> Self {
        Self {
            knowledge,
            generator,
            document_chain,
            judge,
        }
    }

    /// Evaluates the first `samples` stored chunks that are not expert
    /// answers. Judge verdicts are reported without asking anyone.
    pub async fn run(&self, samples: usize) -> Result<EvaluationReport, AppError> {
        let chunks: Vec<DocumentChunk> = self
            .knowledge
            .documents(None)
            .await?
            .into_iter()
            .filter(|chunk| !chunk.is_expert_answer())
            .take(samples)
            .collect();
        tracing::info!("Evaluating {} of {} requested samples", chunks.len(), samples);

        let mut items = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let Some(pair) = self.generator.generate(chunk).await? else {
                continue;
            };
            items.push(self.evaluate_pair(chunk, pair).await?);
        }

        let report = EvaluationReport::new(samples, items);
        tracing::info!(
            "Evaluation finished: {} items, mean correctness {:?}, {} escalations",
            report.items.len(),
            report.mean_correctness,
            report.escalation_count
        );
        Ok(report)
    }

    async fn evaluate_pair(
        &self,
        chunk: &DocumentChunk,
        pair: QaPair,
    ) -> Result<EvaluationItem, AppError> {
        let mut item = EvaluationItem {
            chunk_id: chunk.id.clone(),
            source: chunk.metadata.source.clone(),
            question: pair.question,
            reference_answer: pair.answer,
            generated_answer: None,
            correctness: None,
            escalated: true,
        };

        let Some(record) = self.document_chain.execute(&item.question, &()).await? else {
            return Ok(item);
        };
        let verdict = self.judge.execute(record).await?;
        item.escalated = verdict.is_escalation();

        let record = verdict.into_record();
        item.generated_answer = record.answer;
        item.correctness = record.correctness;
        Ok(item)
    }
}
