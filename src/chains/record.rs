//! The canonical shape every chain result is projected into.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuestionType {
    Product,
    Document,
}

impl QuestionType {
    pub fn id_prefix(self) -> &'static str {
        match self {
            QuestionType::Product => "P",
            QuestionType::Document => "D",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::Product => "PRODUCT",
            QuestionType::Document => "DOCUMENT",
        }
    }

    /// Fresh per-question identifier, e.g. `P3f2a...`.
    pub fn new_question_id(self) -> String {
        format!("{}{}", self.id_prefix(), uuid::Uuid::new_v4().simple())
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field order here is the serialized order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub question_id: String,
    pub question_type: QuestionType,
    #[serde(default, deserialize_with = "deserialize_solved")]
    pub solved: Option<bool>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub context: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_for_correctness: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correctness: Option<i64>,
}

impl Record {
    /// Projects a parsed model response onto the record shape. Keys the
    /// model did not produce stay empty; extra keys are dropped.
    pub fn from_model_output(
        question_id: String,
        question_type: QuestionType,
        output: &Map<String, Value>,
        context: Value,
    ) -> Self {
        Self {
            question_id,
            question_type,
            solved: output.get("solved").and_then(solved_flag),
            question: output.get("question").and_then(text_value),
            answer: output.get("answer").and_then(text_value),
            context,
            reasoning_for_correctness: None,
            correctness: None,
        }
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

/// `true`/`"True"`/`"true"` count as solved; any other string as unsolved.
pub fn solved_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => Some(text.trim().eq_ignore_ascii_case("true")),
        _ => None,
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn deserialize_solved<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        Value::Bool(_) | Value::String(_) => Ok(solved_flag(&value)),
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean or string for `solved`, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(record: &Record) -> Vec<String> {
        serde_json::to_value(record)
            .unwrap()
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect()
    }

    #[test]
    fn projection_fixes_key_order_and_fills_missing_keys() {
        let output = json!({"answer": "12W", "extra": 1, "question": "Leistung?"});
        let record = Record::from_model_output(
            "P1".to_string(),
            QuestionType::Product,
            output.as_object().unwrap(),
            json!({"Leistung": "12W"}),
        );

        assert_eq!(
            keys(&record),
            vec!["question_id", "question_type", "solved", "question", "answer", "context"]
        );
        assert_eq!(record.solved, None);
        assert_eq!(record.answer.as_deref(), Some("12W"));
    }

    #[test]
    fn verdict_fields_follow_the_canonical_ones() {
        let mut record = Record::from_model_output(
            "D1".to_string(),
            QuestionType::Document,
            &Map::new(),
            Value::Null,
        );
        record.reasoning_for_correctness = Some("passt".to_string());
        record.correctness = Some(4);

        let keys = keys(&record);
        assert_eq!(&keys[6..], ["reasoning_for_correctness", "correctness"]);
    }

    #[test]
    fn solved_accepts_strings_and_booleans() {
        assert_eq!(solved_flag(&json!("True")), Some(true));
        assert_eq!(solved_flag(&json!("false")), Some(false));
        assert_eq!(solved_flag(&json!("vielleicht")), Some(false));
        assert_eq!(solved_flag(&json!(true)), Some(true));
        assert_eq!(solved_flag(&json!(1)), None);
    }

    #[test]
    fn question_type_serializes_upper_case_and_prefixes_ids() {
        assert_eq!(json!(QuestionType::Product), json!("PRODUCT"));
        assert!(QuestionType::Document.new_question_id().starts_with('D'));
        assert!(QuestionType::Product.new_question_id().starts_with('P'));
    }

    #[test]
    fn persisted_record_reads_back_with_string_solved() {
        let record: Record = serde_json::from_value(json!({
            "question_id": "P42",
            "question_type": "PRODUCT",
            "solved": "False",
            "question": "Gibt es ein Datenblatt?",
            "answer": null,
            "context": {"Bestell_nr": 42}
        }))
        .unwrap();
        assert_eq!(record.solved, Some(false));
        assert_eq!(record.answer, None);
        assert_eq!(record.correctness, None);
    }
}
