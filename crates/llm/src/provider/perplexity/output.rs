use serde::Deserialize;

use crate::messages::{CompletionResponse, FinishReason, Usage};

/// Response body of the Perplexity chat completions endpoint. The shape
/// is OpenAI compatible, extended with the list of web sources the
/// answer was grounded on.
#[derive(Debug, Deserialize)]
pub(super) struct PerplexityResponse {
    pub(super) model: String,
    pub(super) choices: Vec<PerplexityChoice>,
    pub(super) usage: Option<PerplexityUsage>,
    #[serde(default)]
    pub(super) citations: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PerplexityChoice {
    pub(super) message: PerplexityMessage,
    pub(super) finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PerplexityMessage {
    pub(super) content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PerplexityUsage {
    pub(super) prompt_tokens: u32,
    pub(super) completion_tokens: u32,
}

impl From<PerplexityUsage> for Usage {
    fn from(usage: PerplexityUsage) -> Self {
        Usage::new(usage.prompt_tokens, usage.completion_tokens)
    }
}

pub(super) fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        _ => FinishReason::Other,
    }
}

impl From<PerplexityResponse> for CompletionResponse {
    fn from(response: PerplexityResponse) -> Self {
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
            source_urls: response.citations,
            latency_ms: 0,
        }
    }
}

/// One SSE chunk of a Perplexity streaming response. Perplexity sends
/// the usage alongside the finish reason on the last chunk.
#[derive(Debug, Deserialize)]
pub(super) struct PerplexityStreamChunk {
    #[serde(default)]
    pub(super) choices: Vec<PerplexityStreamChoice>,
    pub(super) usage: Option<PerplexityUsage>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PerplexityStreamChoice {
    pub(super) delta: PerplexityDelta,
    pub(super) finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PerplexityDelta {
    pub(super) content: Option<String>,
}
