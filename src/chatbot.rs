//! The interactive question/answer loop.

use std::sync::Arc;

use crate::chains::{Chain, DocumentChain, Judge, ProductChain, Record, Verdict};
use crate::communication::CommunicationHandler;
use crate::console::{self, Console};
use crate::core::errors::AppError;
use crate::knowledge::{KnowledgeBase, ProductInfo, ProductLookup};
use crate::templates::{FAREWELL, GREETING};

const SEPARATOR: &str =
    "---------------------------------------------------------------------------------";
pub const QUESTION_PROMPT: &str = "\n>>> Ihre Frage:";
pub const PRODUCT_QUESTION_PROMPT: &str = ">>> Was möchten Sie über das Produkt wissen?";
pub const ANOTHER_PRODUCT_QUESTION_PROMPT: &str =
    ">>> Haben Sie eine weitere Frage zum Produkt? (Ja/Nein)";
pub const SATISFACTION_PROMPT: &str = ">>> Sind Sie zufrieden mit der Antwort? (Ja/Nein):";
pub const NO_ANSWER_MESSAGE: &str = "Leider ist für diese Frage keine Antwort verfügbar.";
pub const APOLOGY_MESSAGE: &str =
    "Entschuldigung, bei der Bearbeitung Ihrer Frage ist ein Fehler aufgetreten.";

/// Digits only: the input names a product.
pub fn is_product_code(input: &str) -> bool {
    !input.is_empty() && input.chars().all(|c| c.is_ascii_digit())
}

fn is_exit(input: &str) -> bool {
    input == "exit" || input == "quit"
}

pub struct ChatBot {
    knowledge: Arc<KnowledgeBase>,
    product_chain: Arc<ProductChain>,
    document_chain: Arc<DocumentChain>,
    judge: Arc<Judge>,
    communication: Arc<CommunicationHandler>,
    history: Vec<Record>,
    turns: usize,
}

impl ChatBot {
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        product_chain: Arc<ProductChain>,
        document_chain: Arc<DocumentChain>,
        judge: Arc<Judge>,
        communication: Arc<CommunicationHandler>,
    ) -> Self {
        Self {
            knowledge,
            product_chain,
            document_chain,
            judge,
            communication,
            history: Vec::new(),
            turns: 0,
        }
    }

    /// Runs until `exit`, `quit` or end of input and returns the records of
    /// the session in the order they were produced.
    pub async fn run(&mut self, console: &mut dyn Console) -> Result<Vec<Record>, AppError> {
        tracing::info!("###### NEW CHAT ######");
        self.banner(console, GREETING).await?;

        loop {
            let Some(input) = console.read_line(QUESTION_PROMPT).await? else {
                tracing::info!("Input closed");
                break;
            };
            tracing::info!("USER INPUT: {}", input);

            if is_exit(&input) {
                break;
            }
            let query = input.trim();
            if query.is_empty() {
                continue;
            }

            self.turns += 1;
            let outcome = if is_product_code(query) {
                self.product_turn(console, query).await
            } else {
                self.document_turn(console, query).await
            };

            if let Err(e) = outcome {
                tracing::error!("Turn {} failed: {}", self.turns, e);
                console.say(APOLOGY_MESSAGE).await?;
            }
        }

        self.banner(console, FAREWELL).await?;
        tracing::info!("###### END CHAT ###### ({} turns)", self.turns);
        Ok(std::mem::take(&mut self.history))
    }

    async fn banner(&self, console: &mut dyn Console, text: &str) -> Result<(), AppError> {
        console.say(SEPARATOR).await?;
        console.say(text).await?;
        console.say(SEPARATOR).await
    }

    async fn product_turn(&mut self, console: &mut dyn Console, code: &str) -> Result<(), AppError> {
        match self.knowledge.lookup_product(code).await? {
            ProductLookup::Found(info) => self.product_loop(console, &info).await,
            ProductLookup::NotFound => {
                tracing::info!("No product with code {}", code);
                console
                    .say(&format!("Kein Produkt mit der Nummer {} gefunden.", code))
                    .await
            }
            ProductLookup::Ambiguous { matches } => {
                tracing::warn!("Product code {} matches {} rows", code, matches);
                console
                    .say(&format!(
                        "Die Produktnummer {} ist nicht eindeutig ({} Treffer).",
                        code, matches
                    ))
                    .await
            }
        }
    }

    async fn product_loop(
        &mut self,
        console: &mut dyn Console,
        info: &ProductInfo,
    ) -> Result<(), AppError> {
        loop {
            let Some(query) = console.read_line(PRODUCT_QUESTION_PROMPT).await? else {
                return Ok(());
            };
            if query.trim().is_empty() {
                continue;
            }

            let record = self.product_chain.execute(query.trim(), info).await?;
            self.judge_and_escalate(console, record).await?;

            match console.read_line(ANOTHER_PRODUCT_QUESTION_PROMPT).await? {
                Some(reply) if !console::is_no(&reply) => continue,
                _ => return Ok(()),
            }
        }
    }

    async fn document_turn(&mut self, console: &mut dyn Console, query: &str) -> Result<(), AppError> {
        match self.document_chain.execute(query, &()).await? {
            Some(record) => self.judge_and_escalate(console, record).await,
            None => console.say(NO_ANSWER_MESSAGE).await,
        }
    }

    async fn judge_and_escalate(
        &mut self,
        console: &mut dyn Console,
        record: Record,
    ) -> Result<(), AppError> {
        let verdict = match self.judge.execute(record.clone()).await {
            Ok(verdict) => verdict,
            Err(e) => {
                self.history.push(record);
                return Err(e);
            }
        };
        self.history.push(verdict.record().clone());

        let escalation = match verdict {
            Verdict::Solved(record) => {
                console.say(&answer_text(&record)).await?;
                None
            }
            Verdict::Satisfactory(record) => {
                console.say(&answer_text(&record)).await?;
                match console.read_line(SATISFACTION_PROMPT).await? {
                    Some(reply) if console::is_no(&reply) => Some(record),
                    _ => None,
                }
            }
            Verdict::Escalate(record) => Some(record),
        };

        if let Some(record) = escalation {
            self.communication.ask_and_forward(console, &record).await?;
        }
        Ok(())
    }
}

fn answer_text(record: &Record) -> String {
    format!("{}\n", record.answer.as_deref().unwrap_or("(keine Antwort)"))
}
