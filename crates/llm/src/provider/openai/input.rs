use serde::Serialize;

use crate::messages::{ChatMessage, CompletionRequest};

/// Request body for the OpenAI Chat Completions API.
///
/// See the [OpenAI API Reference](https://platform.openai.com/docs/api-reference/chat/create).
#[derive(Debug, Serialize)]
pub(super) struct OpenAiRequest {
    /// ID of the model to use.
    pub(super) model: String,

    /// A list of messages comprising the conversation so far.
    pub(super) messages: Vec<ChatMessage>,

    /// Sampling temperature between 0 and 2.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) temperature: Option<f32>,

    /// The maximum number of tokens that can be generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) max_completion_tokens: Option<u32>,

    /// If set, partial message deltas are sent as server-sent events,
    /// terminated by a `data: [DONE]` message.
    pub(super) stream: bool,

    /// Streaming options. Used to request a final usage chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
pub(super) struct StreamOptions {
    pub(super) include_usage: bool,
}

impl OpenAiRequest {
    pub(super) fn from_request(model: String, request: &CompletionRequest, stream: bool) -> Self {
        Self {
            model,
            messages: request.messages.clone(),
            temperature: request.temperature,
            max_completion_tokens: request.max_tokens,
            stream,
            stream_options: stream.then_some(StreamOptions { include_usage: true }),
        }
    }
}
