//! Escalation of unanswered questions to a human expert, and re-ingestion
//! of the expert's reply.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::chains::Record;
use crate::console::{self, Console};
use crate::core::errors::AppError;
use crate::knowledge::{DocumentChunk, KnowledgeBase};
use crate::templates::{self, EMAIL_TEMPLATE};

pub const FORWARD_PROMPT: &str =
    ">>> Ich konnte Ihre Frage nicht beantworten. Frage weiterleiten? (Ja/Nein):";
pub const FORWARDED_NOTICE: &str = ">>> Ihre Frage wurde an einen Experten weitergeleitet.";

/// What an expert reply contributes back to the knowledge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpertReply {
    pub question_id: String,
    pub answer: String,
}

pub struct CommunicationHandler {
    knowledge: Arc<KnowledgeBase>,
}

impl CommunicationHandler {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self { knowledge }
    }

    pub fn create_email(&self, record: &Record) -> String {
        templates::render(
            EMAIL_TEMPLATE,
            &[
                ("type_question", record.question_type.as_str()),
                ("llm_output", &record.to_pretty_json()),
            ],
        )
    }

    /// Writes `mail_<id>.txt` and `output_<id>.json` under
    /// `<email_storage>/<id>/`, replacing earlier copies.
    pub async fn persist(&self, email: &str, record: &Record) -> Result<PathBuf, AppError> {
        let id = &record.question_id;
        let folder = self.knowledge.email_storage().join(id);
        tokio::fs::create_dir_all(&folder).await?;

        tokio::fs::write(folder.join(format!("mail_{}.txt", id)), email).await?;
        tokio::fs::write(
            folder.join(format!("output_{}.json", id)),
            serde_json::to_string_pretty(record)?,
        )
        .await?;

        tracing::debug!("Escalation bundle written to {}", folder.display());
        Ok(folder)
    }

    /// Forwards the record only if the user agrees. Returns whether it was
    /// forwarded.
    pub async fn ask_and_forward(
        &self,
        console: &mut dyn Console,
        record: &Record,
    ) -> Result<bool, AppError> {
        let Some(reply) = console.read_line(FORWARD_PROMPT).await? else {
            return Ok(false);
        };
        if !console::is_yes(&reply) {
            tracing::info!("User declined forwarding {}", record.question_id);
            return Ok(false);
        }

        let email = self.create_email(record);
        self.persist(&email, record).await?;
        console.say(FORWARDED_NOTICE).await?;
        tracing::info!("QUESTION NOT SOLVED! EMAIL SENT TO EXPERT ({})", record.question_id);
        Ok(true)
    }

    /// Reads an expert reply file, turns it into an expert-answer document
    /// and adds it to the vector store.
    pub async fn resolve_expert_reply(&self, reply_path: &Path) -> Result<DocumentChunk, AppError> {
        let contents = tokio::fs::read_to_string(reply_path).await?;
        let reply = parse_expert_reply(&contents)?;

        let doc = self
            .knowledge
            .create_expert_doc(
                &reply.question_id,
                &reply.answer,
                &reply_path.display().to_string(),
            )
            .await?;
        self.knowledge.add_document(&doc).await?;

        tracing::info!(
            "Expert answer for {} added to the knowledge base",
            reply.question_id
        );
        Ok(doc)
    }
}

fn cached_regex(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn answer_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached_regex(&CELL, r"(?s)<\|human_expert\|>(.*?)</\|human_expert\|>")
}

fn record_block_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached_regex(&CELL, r"(?s)<\|llm_output\|>(.*?)</\|llm_output\|>")
}

fn question_id_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached_regex(
        &CELL,
        r#""question_id"\s*:\s*"([^"]+)"|'question_id'\s*:\s*'([^']+)'"#,
    )
}

/// Extracts the expert's answer and the id of the question it belongs to.
pub fn parse_expert_reply(text: &str) -> Result<ExpertReply, AppError> {
    let answer = answer_regex()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().replace(['\n', '\r'], ""))
        .ok_or_else(|| AppError::BadRequest("reply has no <|human_expert|> block".to_string()))?;

    let question_id = question_id_from_record_block(text)
        .or_else(|| question_id_from_pattern(text))
        .ok_or_else(|| AppError::BadRequest("reply does not name a question_id".to_string()))?;

    Ok(ExpertReply {
        question_id,
        answer,
    })
}

fn question_id_from_record_block(text: &str) -> Option<String> {
    let block = record_block_regex()?.captures(text)?.get(1)?.as_str();
    match serde_json::from_str::<Record>(block.trim()) {
        Ok(record) => Some(record.question_id),
        Err(e) => {
            tracing::debug!("Record block in reply did not parse ({}), using pattern", e);
            None
        }
    }
}

fn question_id_from_pattern(text: &str) -> Option<String> {
    let caps = question_id_regex()?.captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}
