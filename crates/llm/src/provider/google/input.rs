use serde::Serialize;

use crate::messages::{ChatRole, CompletionRequest};

/// Request body for the Gemini `generateContent` family of endpoints.
///
/// See the [Gemini API Reference](https://ai.google.dev/api/generate-content).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct GoogleGenerateRequest {
    /// The conversation, alternating `user` and `model` turns.
    pub(super) contents: Vec<GoogleContent>,

    /// System prompt, kept apart from the conversation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) system_instruction: Option<GoogleContentParts>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) generation_config: Option<GoogleGenerationConfig>,
}

#[derive(Debug, Serialize)]
pub(super) struct GoogleContent {
    pub(super) role: &'static str,
    pub(super) parts: Vec<GooglePart>,
}

/// A content value without a role, used for the system instruction.
#[derive(Debug, Serialize)]
pub(super) struct GoogleContentParts {
    pub(super) parts: Vec<GooglePart>,
}

#[derive(Debug, Serialize)]
pub(super) struct GooglePart {
    pub(super) text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct GoogleGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) max_output_tokens: Option<u32>,
}

impl GoogleGenerateRequest {
    pub(super) fn from_request(request: &CompletionRequest) -> Self {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();

        for message in &request.messages {
            let part = GooglePart {
                text: message.content.clone(),
            };

            match message.role {
                ChatRole::System => system_parts.push(part),
                ChatRole::User => contents.push(GoogleContent {
                    role: "user",
                    parts: vec![part],
                }),
                ChatRole::Assistant => contents.push(GoogleContent {
                    role: "model",
                    parts: vec![part],
                }),
            }
        }

        let generation_config = (request.temperature.is_some() || request.max_tokens.is_some()).then(|| {
            GoogleGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            }
        });

        Self {
            contents,
            system_instruction: (!system_parts.is_empty()).then(|| GoogleContentParts { parts: system_parts }),
            generation_config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ChatMessage, Platform};

    #[test]
    fn assistant_turns_use_the_model_role() {
        let mut request = CompletionRequest::new(Platform::Google, "What about their pricing?");
        request.messages.insert(0, ChatMessage::user("Tell me about Acme"));
        request.messages.insert(
            1,
            ChatMessage {
                role: ChatRole::Assistant,
                content: "Acme sells anvils.".to_string(),
            },
        );
        request.temperature = Some(0.2);

        let body = GoogleGenerateRequest::from_request(&request);

        assert_eq!(body.contents.len(), 3);
        assert_eq!(body.contents[1].role, "model");
        assert!(body.system_instruction.is_none());
        assert_eq!(body.generation_config.unwrap().temperature, Some(0.2));
    }
}
