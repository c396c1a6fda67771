use serde::Deserialize;

use crate::messages::{CompletionResponse, FinishReason, StreamChunk, Usage};

/// Response body of the Anthropic Messages API.
#[derive(Debug, Deserialize)]
pub(super) struct AnthropicResponse {
    pub(super) model: String,
    pub(super) content: Vec<AnthropicContentBlock>,
    pub(super) stop_reason: Option<String>,
    pub(super) usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
pub(super) struct AnthropicContentBlock {
    #[serde(default)]
    pub(super) text: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
pub(super) struct AnthropicUsage {
    #[serde(default)]
    pub(super) input_tokens: u32,
    #[serde(default)]
    pub(super) output_tokens: u32,
}

pub(super) fn map_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        _ => FinishReason::Other,
    }
}

impl From<AnthropicResponse> for CompletionResponse {
    fn from(response: AnthropicResponse) -> Self {
        let content = response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        CompletionResponse {
            content,
            model: response.model,
            usage: Usage::new(response.usage.input_tokens, response.usage.output_tokens),
            finish_reason: response.stop_reason.as_deref().map(map_stop_reason),
            citations: None,
            source_urls: Vec::new(),
            latency_ms: 0,
        }
    }
}

/// Server-sent events of a streaming Messages API response.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(super) enum AnthropicStreamEvent {
    MessageStart { message: AnthropicStreamMessage },
    ContentBlockStart {},
    ContentBlockDelta { delta: AnthropicTextDelta },
    ContentBlockStop {},
    MessageDelta { delta: AnthropicMessageDelta, usage: AnthropicUsage },
    MessageStop,
    Ping,
}

#[derive(Debug, Deserialize)]
pub(super) struct AnthropicStreamMessage {
    pub(super) usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
pub(super) struct AnthropicTextDelta {
    #[serde(default)]
    pub(super) text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AnthropicMessageDelta {
    pub(super) stop_reason: Option<String>,
}

/// Folds the stateful Anthropic event protocol into neutral chunks.
///
/// The prompt token count arrives on `message_start`, content on
/// `content_block_delta`, and the completion token count with the stop
/// reason on `message_delta`, which becomes the final chunk.
#[derive(Default)]
pub(super) struct AnthropicStreamProcessor {
    input_tokens: u32,
}

impl AnthropicStreamProcessor {
    pub(super) fn process_event(&mut self, event: AnthropicStreamEvent) -> Option<StreamChunk> {
        match event {
            AnthropicStreamEvent::MessageStart { message } => {
                self.input_tokens = message.usage.input_tokens;
                None
            }
            AnthropicStreamEvent::ContentBlockDelta { delta } => {
                delta.text.filter(|text| !text.is_empty()).map(StreamChunk::delta)
            }
            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                Some(StreamChunk::finish(
                    Some(Usage::new(self.input_tokens, usage.output_tokens)),
                    delta.stop_reason.as_deref().map(map_stop_reason),
                ))
            }
            AnthropicStreamEvent::ContentBlockStart {}
            | AnthropicStreamEvent::ContentBlockStop {}
            | AnthropicStreamEvent::MessageStop
            | AnthropicStreamEvent::Ping => None,
        }
    }
}
