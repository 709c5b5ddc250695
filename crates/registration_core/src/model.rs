//! Amazon Titan text-generation wire format.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MODEL_ID: &str = "amazon.titan-text-express-v1";
pub const MODEL_CONTENT_TYPE: &str = "application/json";

pub const DEFAULT_MAX_TOKEN_COUNT: u32 = 4096;
pub const MAX_TOKEN_COUNT_LIMIT: u32 = 8192;
pub const DEFAULT_TEMPERATURE: f32 = 1.0;
pub const DEFAULT_TOP_P: f32 = 0.9;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextGenerationConfig {
    pub max_token_count: u32,
    pub stop_sequences: Vec<String>,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for TextGenerationConfig {
    fn default() -> Self {
        Self {
            max_token_count: DEFAULT_MAX_TOKEN_COUNT,
            stop_sequences: Vec::new(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }
}

impl TextGenerationConfig {
    /// Clamps every knob into the range the model accepts.
    pub fn bounded(self) -> Self {
        Self {
            max_token_count: self.max_token_count.clamp(1, MAX_TOKEN_COUNT_LIMIT),
            stop_sequences: self.stop_sequences,
            temperature: clamp_unit(self.temperature),
            top_p: clamp_unit(self.top_p),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextGenerationRequest {
    pub input_text: String,
    pub text_generation_config: TextGenerationConfig,
}

impl TextGenerationRequest {
    pub fn new(prompt: impl Into<String>, config: TextGenerationConfig) -> Self {
        Self {
            input_text: prompt.into(),
            text_generation_config: config.bounded(),
        }
    }

    pub fn to_body(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TextGenerationResponse {
    #[serde(default)]
    results: Vec<TextGenerationResult>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextGenerationResult {
    #[serde(default)]
    output_text: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelResponseError {
    #[error("malformed model response: {0}")]
    Malformed(String),

    #[error("model response contained no results")]
    NoResults,

    #[error("model returned empty text")]
    EmptyOutput,
}

/// Extracts the first result's text, trimmed. Blank output is an error.
pub fn decode_output_text(body: &[u8]) -> Result<String, ModelResponseError> {
    let response: TextGenerationResponse = serde_json::from_slice(body)
        .map_err(|error| ModelResponseError::Malformed(error.to_string()))?;

    let first = response
        .results
        .into_iter()
        .next()
        .ok_or(ModelResponseError::NoResults)?;

    let text = first.output_text.trim();
    if text.is_empty() {
        return Err(ModelResponseError::EmptyOutput);
    }
    Ok(text.to_string())
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
