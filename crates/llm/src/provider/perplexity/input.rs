use serde::Serialize;

use crate::messages::{ChatMessage, CompletionRequest};

/// Request body for the Perplexity chat completions endpoint. The wire
/// format follows the OpenAI one, with `max_tokens` spelled the legacy
/// way.
#[derive(Debug, Serialize)]
pub(super) struct PerplexityRequest {
    pub(super) model: String,

    pub(super) messages: Vec<ChatMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) max_tokens: Option<u32>,

    pub(super) stream: bool,
}

impl PerplexityRequest {
    pub(super) fn from_request(model: String, request: &CompletionRequest, stream: bool) -> Self {
        Self {
            model,
            messages: request.messages.clone(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        }
    }
}
