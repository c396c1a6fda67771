use serde::Deserialize;

use crate::messages::{CompletionResponse, FinishReason, Usage};

/// Response body of the OpenAI Chat Completions API.
#[derive(Debug, Deserialize)]
pub(super) struct OpenAiResponse {
    pub(super) model: String,
    pub(super) choices: Vec<OpenAiChoice>,
    pub(super) usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OpenAiChoice {
    pub(super) message: OpenAiMessage,
    pub(super) finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OpenAiMessage {
    pub(super) content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OpenAiUsage {
    pub(super) prompt_tokens: u32,
    pub(super) completion_tokens: u32,
}

impl From<OpenAiUsage> for Usage {
    fn from(usage: OpenAiUsage) -> Self {
        Usage::new(usage.prompt_tokens, usage.completion_tokens)
    }
}

pub(super) fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Other,
    }
}

impl From<OpenAiResponse> for CompletionResponse {
    fn from(response: OpenAiResponse) -> Self {
        let (content, finish_reason) = response
            .choices
            .into_iter()
            .next()
            .map(|choice| {
                (
                    choice.message.content.unwrap_or_default(),
                    choice.finish_reason.as_deref().map(map_finish_reason),
                )
            })
            .unwrap_or_default();

        CompletionResponse {
            content,
            model: response.model,
            usage: response.usage.map(Into::into).unwrap_or_default(),
            finish_reason,
            citations: None,
            source_urls: Vec::new(),
            latency_ms: 0,
        }
    }
}

/// One SSE chunk of an OpenAI streaming response.
#[derive(Debug, Deserialize)]
pub(super) struct OpenAiStreamChunk {
    #[serde(default)]
    pub(super) choices: Vec<OpenAiStreamChoice>,
    pub(super) usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OpenAiStreamChoice {
    pub(super) delta: OpenAiDelta,
    pub(super) finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OpenAiDelta {
    pub(super) content: Option<String>,
}

