use async_trait::async_trait;
use serde_json::Value;

use super::output::parse_structured_output;
use super::record::{QuestionType, Record};
use super::{log_execution, log_result, Chain, ChainModel};
use crate::core::errors::AppError;
use crate::knowledge::ProductInfo;
use crate::templates::{self, PRODUCT_PROMPT, PRODUCT_RESPONSE};

/// Answers questions about one product row.
pub struct ProductChain {
    model: ChainModel,
}

impl ProductChain {
    pub fn new(model: ChainModel) -> Self {
        Self { model }
    }

    fn prompt(&self, query: &str, info: &ProductInfo) -> Result<String, AppError> {
        let context = serde_json::to_string_pretty(info)?;
        let schema = templates::format_instructions(PRODUCT_RESPONSE);
        Ok(templates::render(
            PRODUCT_PROMPT,
            &[
                ("question", query),
                ("context", &context),
                ("schema", &schema),
            ],
        ))
    }
}

#[async_trait]
impl Chain for ProductChain {
    type Input = ProductInfo;
    type Output = Record;

    fn name(&self) -> &'static str {
        "ProductChain"
    }

    /// Malformed model output fails the call.
    async fn execute(&self, query: &str, info: &ProductInfo) -> Result<Record, AppError> {
        log_execution(self.name(), query);

        let prompt = self.prompt(query, info)?;
        let raw = self.model.invoke(self.name(), prompt).await?;
        let output = parse_structured_output(&raw)?;

        let record = Record::from_model_output(
            QuestionType::Product.new_question_id(),
            QuestionType::Product,
            &output,
            Value::Object(info.clone()),
        );
        log_result(self.name(), &record);
        Ok(record)
    }
}
