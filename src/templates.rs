//! Prompt templates and the response fields each prompt asks the model for.
//!
//! Prompts use the ChatML turn markers the served models were tuned on.
//! Placeholders are written `{name}` and filled by [`render`].

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Value};

pub const DOCUMENT_PROMPT: &str = "<|im_start|>system
You are an expert assistant specializing in answering questions about lamps. Your goal is to provide accurate, concise, and helpful responses based on the given context. Follow these guidelines when answering the user's question:

    - Review the provided context carefully to ensure you have information related to the question.
    - Keep your answer brief and to the point, limiting it to a maximum of 3 sentences.
    - If you cannot answer the question based on the given context, inform the user rather than inventing an answer.
    - If the context is incomplete or irrelevant, politely inform the user that the provided information is insufficient to answer their question.

Format your response according to the provided schema: {schema}

Context:
{context}
<|im_end|>
<|im_start|>user
Question: {question}<|im_end|>
<|im_start|>assistant";

pub const PRODUCT_PROMPT: &str = "<|im_start|>system
As a lamp product expert, you will answer questions about specific products. Utilize the product information provided below to answer questions. Pay attention to the column names in the product information.
If the user requests a datasheet and there are uncertainties, provide either the \"eCAT Datenblatt\" or the \"EU-Verordnung-Produktdatenblatt\". When the user asks for an energy efficiency label, they are referring to the EEL label. If the user asks for the designation or the name, always provide the long designation (Bezeichnung_lang)
The product information is given as a JSON object, where each key is a column name and its value is the product information. For example, in the pair key = 'Leistung' and value = '12W', 'Leistung' represents the column and '12W' represents the information.
Before providing an answer, review the product information to ensure you have a column related to the question. If you cannot answer the question, indicate this and do not invent answers.

Product information:
{context}

Use the following format for the response:
{schema}

<|im_end|>
<|im_start|>user
Question: {question}<|im_end|>
<|im_start|>assistant";

pub const JUDGE_PROMPT: &str = " <|im_start|>system
Please act as an impartial judge and evaluate the quality of the provided answer which attempts to answer the provided question based on a provided context.
You'll be given a function grading_function which you'll call for each provided context, question and answer to submit your reasoning and score for the correctness of the answer.
Please make sure you always call the function to submit result.

- Correctness: If the answer correctly answer the question, below are the details for different scores:
  - Score 0: the answer is completely incorrect, doesn't mention anything about the question or is completely contrary to the correct answer.
      - For example, when asked “Welches sind die Vorteile der SME LED-Beleuchtung?”, the answer is empty string, or content that's completely irrelevant, or sorry I don't know the answer.
  - Score 1: the answer provides some relevance to the question and answer one aspect of the question correctly.
      - Example:
          - Question: Welches sind die Vorteile der SME LED-Beleuchtung?
          - Answer: SME LED-Beleuchtung ist eine gute Wahl.
          - Or answer:  Vorteile der SME LED-Beleuchtung sind, dass sie energieeffizient ist und lange hält.
  - Score 3: the answer mostly answer the question but is missing or hallucinating on one critical aspect.
      - Example:
          - Question: Welches sind die Vorteile der SME LED-Beleuchtung?
          - Answer: “SME LED-Beleuchtung bietet viele Vorteile, wie Energieeinsparung, lange Lebensdauer und einfache Installation.
          Sie ist außerdem in verschiedenen Farben und Helligkeiten erhältlich, sodass sie für jeden Bedarf die richtige Wahl ist.”
  - Score 4: the answer correctly answer the question and not missing any major aspect
      - Example:
          - Question: Welches sind die Vorteile der SME LED-Beleuchtung?
          - Answer: SME LED-Beleuchtung punktet mit Energieeinsparung (bis zu 90%!), langer Lebensdauer, Umweltfreundlichkeit und besserer Lichtqualität.
          Die große Auswahl an Formen und smarten Funktionen machen sie ideal für jeden Bedarf.
          Sparen Sie Kosten, schützen Sie die Umwelt und genießen Sie angenehmes Licht mit SME LED.”

Use the following function for the response:
{schema}

<|im_start|>user
Provided question:
{question}

Provided answer:
{answer}

Provided context:
{context}<|im_end|>
<|im_start|>assistant";

pub const QA_GENERATION_PROMPT: &str = "<|im_start|>system
Your task is to write a factoid question and an answer given a context.
Your factoid question should be answerable with a specific, concise piece of factual information from the context.
Your factoid question should be formulated in the same style as questions users could ask in a search engine.
This means that your factoid question MUST NOT mention something like \"according to the passage\" or \"context\".

Provide your answer as follows:

{schema}
<|im_end|>
<|im_start|>user
Context: {context}<|im_end|>
<|im_start|>assistant";

pub const EMAIL_TEMPLATE: &str = "Chatbot could not answer the {type_question} question.
<|llm_output|>
{llm_output}
</|llm_output|>

Please provide the correct answer for the question and reply to this mail.
<|human_expert|>

</|human_expert|>";

pub const GREETING: &str = "Willkommen zum ChatBot 🦜. Wie kann ich heute helfen?
Für Informationen zu einem spezifischen Produkt, geben Sie bitte die Produktnummer an.
Für allgemeine Informationen, geben Sie bitte Ihre Frage ein.
Schreibe 'exit' oder 'quit' um das Programm zu beenden.";

pub const FAREWELL: &str = "Auf Wiedersehen! 🦜";

/// One named field of a structured model response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseField {
    pub name: &'static str,
    pub description: &'static str,
}

impl ResponseField {
    pub const fn new(name: &'static str, description: &'static str) -> Self {
        Self { name, description }
    }
}

pub const PRODUCT_RESPONSE: &[ResponseField] = &[
    ResponseField::new("question", "Question of the user"),
    ResponseField::new("answer", "Answer to the question"),
    ResponseField::new(
        "solved",
        "Could the model answer the question with given product information? True if yes, otherwise False",
    ),
];

pub const DOCUMENT_RESPONSE: &[ResponseField] =
    &[ResponseField::new("answer", "Answer to the question")];

pub const QA_RESPONSE: &[ResponseField] = &[
    ResponseField::new("question", "your factoid question in German"),
    ResponseField::new("answer", "your answer to the factoid question in German"),
];

/// Function-call description the judge fills in.
pub fn judge_schema() -> Value {
    json!({
        "name": "grading_function",
        "description": "Call this function to submit the grading for the answer",
        "parameters": {
            "type": "object",
            "properties": {
                "reasoning_for_correctness": {
                    "type": "string",
                    "description": "Your reasoning for giving the grading for the correctness of the answer. Provide explanation."
                },
                "correctness": {
                    "type": "integer",
                    "description": "Your integer grading between 0 to 4 for the correctness of the answer."
                }
            },
            "required": ["reasoning_for_correctness", "correctness"]
        }
    })
}

/// Instructions asking for a fenced JSON object with exactly `fields`.
pub fn format_instructions(fields: &[ResponseField]) -> String {
    let body = fields
        .iter()
        .map(|field| format!("\t\"{}\": string  // {}", field.name, field.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "The output should be a markdown code snippet formatted in the following schema, \
         including the leading and trailing \"```json\" and \"```\":\n\n```json\n{{\n{}\n}}\n```",
        body
    )
}

fn placeholder_regex() -> Option<&'static Regex> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{(\w+)\}").ok())
        .as_ref()
}

/// Fills `{name}` placeholders in one pass. Substituted text is never
/// rescanned, so values may contain braces. Unknown placeholders are kept.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let Some(placeholder) = placeholder_regex() else {
        return template.to_string();
    };
    let values: HashMap<&str, &str> = values.iter().copied().collect();
    placeholder
        .replace_all(template, |caps: &regex::Captures<'_>| {
            match values.get(&caps[1]) {
                Some(value) => (*value).to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_replaces_known_placeholders_once() {
        let rendered = render(
            "Q: {question}\nC: {context}\n{unknown}",
            &[("question", "Wie hell?"), ("context", "{\"Lichtstrom\": 1450}")],
        );
        assert_eq!(rendered, "Q: Wie hell?\nC: {\"Lichtstrom\": 1450}\n{unknown}");
    }

    #[test]
    fn format_instructions_list_fields_in_order() {
        let text = format_instructions(PRODUCT_RESPONSE);
        let question = text.find("\"question\"").unwrap();
        let answer = text.find("\"answer\"").unwrap();
        let solved = text.find("\"solved\"").unwrap();
        assert!(question < answer && answer < solved);
        assert!(text.contains("```json"));
    }

    #[test]
    fn judge_schema_names_both_verdict_fields() {
        let schema = judge_schema();
        let required = schema["parameters"]["required"].as_array().unwrap();
        assert_eq!(required.len(), 2);
        assert_eq!(schema["name"], "grading_function");
    }

    #[test]
    fn email_template_has_both_marker_pairs() {
        for marker in [
            "<|llm_output|>",
            "</|llm_output|>",
            "<|human_expert|>",
            "</|human_expert|>",
        ] {
            assert!(EMAIL_TEMPLATE.contains(marker));
        }
        assert!(EMAIL_TEMPLATE.contains("{llm_output}"));
        assert!(EMAIL_TEMPLATE.contains("{type_question}"));
    }
}
