use serde::Serialize;

use crate::messages::{ChatRole, CompletionRequest};

/// Tokens generated when a request does not bound the completion. The
/// Messages API requires an explicit limit.
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Request body for the Anthropic Messages API.
///
/// See the [Anthropic API Reference](https://docs.anthropic.com/en/api/messages).
#[derive(Debug, Serialize)]
pub(super) struct AnthropicRequest {
    /// The model that will complete the prompt.
    pub(super) model: String,

    /// Input messages. System messages are hoisted into `system`, the
    /// remainder alternates user and assistant turns.
    pub(super) messages: Vec<AnthropicMessage>,

    /// The maximum number of tokens to generate.
    pub(super) max_tokens: u32,

    /// System prompt, separate from the conversation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) system: Option<String>,

    /// Sampling temperature between 0 and 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) temperature: Option<f32>,

    /// Whether to stream the response as server-sent events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) stream: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(super) struct AnthropicMessage {
    pub(super) role: &'static str,
    pub(super) content: String,
}

impl AnthropicRequest {
    pub(super) fn from_request(model: String, request: &CompletionRequest, stream: bool) -> Self {
        let mut system_parts = Vec::new();
        let mut messages = Vec::new();

        for message in &request.messages {
            match message.role {
                ChatRole::System => system_parts.push(message.content.clone()),
                ChatRole::User => messages.push(AnthropicMessage {
                    role: "user",
                    content: message.content.clone(),
                }),
                ChatRole::Assistant => messages.push(AnthropicMessage {
                    role: "assistant",
                    content: message.content.clone(),
                }),
            }
        }

        Self {
            model,
            messages,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
            temperature: request.temperature,
            stream: stream.then_some(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ChatMessage, Platform};

    #[test]
    fn system_messages_are_hoisted() {
        let mut request = CompletionRequest::new(Platform::Anthropic, "Tell me about Acme");
        request.messages.insert(0, ChatMessage::system("You monitor brands."));

        let body = AnthropicRequest::from_request("claude-sonnet-4".to_string(), &request, false);

        assert_eq!(body.system.as_deref(), Some("You monitor brands."));
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.messages[0].role, "user");
        assert_eq!(body.max_tokens, 1024);
    }
}
