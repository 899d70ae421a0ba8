//! Decides whether a chain's answer is good enough to show or has to be
//! escalated to a human expert.

use serde_json::{Map, Value};

use super::output::parse_structured_output;
use super::record::{QuestionType, Record};
use super::{log_execution, log_result, ChainModel};
use crate::core::errors::AppError;
use crate::templates::{self, JUDGE_PROMPT};

/// Lowest correctness grade that does not escalate.
pub const PASSING_CORRECTNESS: i64 = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Product question the model marked as answered.
    Solved(Record),
    /// Document answer graded at or above [`PASSING_CORRECTNESS`].
    Satisfactory(Record),
    Escalate(Record),
}

impl Verdict {
    pub fn record(&self) -> &Record {
        match self {
            Verdict::Solved(record) | Verdict::Satisfactory(record) | Verdict::Escalate(record) => {
                record
            }
        }
    }

    pub fn into_record(self) -> Record {
        match self {
            Verdict::Solved(record) | Verdict::Satisfactory(record) | Verdict::Escalate(record) => {
                record
            }
        }
    }

    pub fn is_escalation(&self) -> bool {
        matches!(self, Verdict::Escalate(_))
    }

    pub fn into_escalation(self) -> Option<Record> {
        match self {
            Verdict::Escalate(record) => Some(record),
            _ => None,
        }
    }
}

/// Stateless; every call works only on the record it is given.
pub struct Judge {
    model: ChainModel,
}

impl Judge {
    pub fn new(model: ChainModel) -> Self {
        Self { model }
    }

    pub fn name(&self) -> &'static str {
        "Judge"
    }

    pub async fn execute(&self, record: Record) -> Result<Verdict, AppError> {
        log_execution(self.name(), record.question.as_deref().unwrap_or_default());

        let verdict = match record.question_type {
            QuestionType::Product => judge_product(record),
            QuestionType::Document => self.judge_document(record).await?,
        };

        log_result(self.name(), verdict.record());
        tracing::info!(
            "Judge verdict for {}: {}",
            verdict.record().question_id,
            match &verdict {
                Verdict::Solved(_) => "solved",
                Verdict::Satisfactory(_) => "satisfactory",
                Verdict::Escalate(_) => "escalate",
            }
        );
        Ok(verdict)
    }

    async fn judge_document(&self, mut record: Record) -> Result<Verdict, AppError> {
        let contexts = page_contents(&record.context);
        record.context = Value::from(contexts.clone());

        let schema = serde_json::to_string_pretty(&templates::judge_schema())?;
        let context = serde_json::to_string_pretty(&contexts)?;
        let prompt = templates::render(
            JUDGE_PROMPT,
            &[
                ("schema", &schema),
                ("question", record.question.as_deref().unwrap_or_default()),
                ("answer", record.answer.as_deref().unwrap_or_default()),
                ("context", &context),
            ],
        );

        let raw = self.model.invoke(self.name(), prompt).await?;
        match parse_structured_output(&raw) {
            Ok(output) => {
                let grading = grading_arguments(&output);
                record.reasoning_for_correctness = grading
                    .get("reasoning_for_correctness")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                record.correctness = grading.get("correctness").and_then(correctness_value);
            }
            Err(e) => {
                tracing::warn!("Judge output for {} unusable: {}", record.question_id, e);
            }
        }

        Ok(match record.correctness {
            Some(grade) if grade >= PASSING_CORRECTNESS => Verdict::Satisfactory(record),
            _ => Verdict::Escalate(record),
        })
    }
}

fn judge_product(record: Record) -> Verdict {
    if record.solved == Some(true) {
        Verdict::Solved(record)
    } else {
        Verdict::Escalate(record)
    }
}

/// Chunk objects are reduced to their text; plain strings pass through.
fn page_contents(context: &Value) -> Vec<String> {
    match context {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.clone()),
                Value::Object(chunk) => chunk
                    .get("page_content")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect(),
        Value::String(text) => vec![text.clone()],
        _ => Vec::new(),
    }
}

/// Models sometimes answer with the whole function call instead of just
/// its arguments.
fn grading_arguments(output: &Map<String, Value>) -> &Map<String, Value> {
    if output.contains_key("correctness") {
        return output;
    }
    ["arguments", "parameters"]
        .iter()
        .find_map(|key| output.get(*key).and_then(Value::as_object))
        .unwrap_or(output)
}

fn correctness_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>().ok().or_else(|| {
                text.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{chain_model, ScriptedLlm};
    use serde_json::json;
    use std::sync::Arc;

    fn product_record(solved: Option<bool>) -> Record {
        Record {
            question_id: "P1".to_string(),
            question_type: QuestionType::Product,
            solved,
            question: Some("Gibt es ein Datenblatt?".to_string()),
            answer: Some("Nein.".to_string()),
            context: json!({"Bestell_nr": 1234}),
            reasoning_for_correctness: None,
            correctness: None,
        }
    }

    fn document_record() -> Record {
        Record {
            question_id: "D1".to_string(),
            question_type: QuestionType::Document,
            solved: None,
            question: Some("Wie lange ist die Garantie?".to_string()),
            answer: Some("Fünf Jahre.".to_string()),
            context: json!([
                {"id": "c1", "page_content": "Die Garantie beträgt fünf Jahre", "metadata": {"source": "g.pdf"}}
            ]),
            reasoning_for_correctness: None,
            correctness: None,
        }
    }

    fn judge(replies: &[&str]) -> (Arc<ScriptedLlm>, Judge) {
        let llm = Arc::new(ScriptedLlm::new(replies.iter().copied()));
        (llm.clone(), Judge::new(chain_model(llm)))
    }

    #[tokio::test]
    async fn solved_product_is_not_escalated() {
        let (llm, judge) = judge(&[]);
        let record: Record = serde_json::from_value(json!({
            "question_id": "P1", "question_type": "PRODUCT", "solved": "true",
            "question": "q", "answer": "a", "context": {}
        }))
        .unwrap();

        let verdict = judge.execute(record).await.unwrap();
        assert!(matches!(verdict, Verdict::Solved(_)));
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn unsolved_product_is_escalated_unchanged() {
        let (_llm, judge) = judge(&[]);
        let record = product_record(Some(false));

        let escalated = judge.execute(record.clone()).await.unwrap().into_escalation();
        assert_eq!(escalated, Some(record));

        let verdict = judge.execute(product_record(None)).await.unwrap();
        assert!(verdict.is_escalation());
    }

    #[tokio::test]
    async fn high_correctness_passes_and_merges_verdict() {
        let (llm, judge) = judge(&[
            r#"{"reasoning_for_correctness": "Vollständig.", "correctness": 4}"#,
        ]);

        let verdict = judge.execute(document_record()).await.unwrap();
        let Verdict::Satisfactory(record) = verdict else {
            panic!("expected a satisfactory verdict");
        };
        assert_eq!(record.correctness, Some(4));
        assert_eq!(record.reasoning_for_correctness.as_deref(), Some("Vollständig."));
        assert_eq!(record.context, json!(["Die Garantie beträgt fünf Jahre"]));

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("\"name\": \"grading_function\""));
        assert!(prompt.contains("Provided answer:\nFünf Jahre."));
    }

    #[tokio::test]
    async fn low_or_missing_correctness_escalates() {
        let (_llm, judge) = judge(&[
            r#"{"reasoning_for_correctness": "Teilweise.", "correctness": 2}"#,
            r#"{"reasoning_for_correctness": "Keine Note."}"#,
            "Die Antwort ist gut.",
        ]);

        let low = judge.execute(document_record()).await.unwrap();
        assert!(low.is_escalation());
        assert_eq!(low.record().correctness, Some(2));

        let missing = judge.execute(document_record()).await.unwrap();
        assert!(missing.is_escalation());
        assert_eq!(missing.record().correctness, None);

        let malformed = judge.execute(document_record()).await.unwrap();
        assert!(malformed.is_escalation());
    }

    #[tokio::test]
    async fn function_call_shaped_verdict_and_string_grades_are_accepted() {
        let (_llm, judge) = judge(&[
            r#"{"name": "grading_function", "arguments": {"reasoning_for_correctness": "ok", "correctness": "3"}}"#,
        ]);

        let verdict = judge.execute(document_record()).await.unwrap();
        assert!(matches!(verdict, Verdict::Satisfactory(_)));
        assert_eq!(verdict.record().correctness, Some(3));
    }

    #[test]
    fn correctness_accepts_numbers_and_numeric_strings() {
        assert_eq!(correctness_value(&json!(4)), Some(4));
        assert_eq!(correctness_value(&json!(3.0)), Some(3));
        assert_eq!(correctness_value(&json!(" 2 ")), Some(2));
        assert_eq!(correctness_value(&json!("gut")), None);
        assert_eq!(correctness_value(&Value::Null), None);
    }
}
