use serde::Serialize;

use crate::core::config::LlmConfig;

/// Sampling parameters shared by every chain.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f64,
    pub top_p: f64,
    pub repeat_penalty: f64,
    pub max_tokens: u32,
    pub stop: Vec<String>,
    pub grammar: Option<String>,
}

impl GenerationSettings {
    pub fn from_config(config: &LlmConfig, grammar: Option<String>) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            repeat_penalty: config.repeat_penalty,
            max_tokens: config.max_tokens,
            stop: config.stop.clone(),
            grammar,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            top_p: 1.0,
            repeat_penalty: 1.1,
            max_tokens: 2048,
            stop: vec!["\n\n".to_string()],
            grammar: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f64>,
    #[serde(rename = "n_predict", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grammar: Option<String>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: None,
            top_p: None,
            repeat_penalty: None,
            max_tokens: None,
            stop: Vec::new(),
            grammar: None,
        }
    }

    pub fn with_settings(mut self, settings: &GenerationSettings) -> Self {
        self.temperature = Some(settings.temperature);
        self.top_p = Some(settings.top_p);
        self.repeat_penalty = Some(settings.repeat_penalty);
        self.max_tokens = Some(settings.max_tokens);
        self.stop = settings.stop.clone();
        self.grammar = settings.grammar.clone();
        self
    }
}
