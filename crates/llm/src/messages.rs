//! Provider-neutral request and response types.

use std::collections::BTreeMap;

use citation::Citation;
use serde::{Deserialize, Serialize};

pub use config::Platform;

/// Role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions that frame the conversation.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
}

impl ChatRole {
    /// The lowercase wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who authored the message.
    pub role: ChatRole,
    /// The message text.
    pub content: String,
}

impl ChatMessage {
    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }
}

/// A completion request against one platform.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompletionRequest {
    /// The platform to dispatch to.
    pub platform: Platform,

    /// Model id. When absent, the provider's configured default model is
    /// used.
    #[serde(default)]
    pub model: Option<String>,

    /// Conversation so far.
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature.
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Upper bound on generated tokens.
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Request a streaming response.
    #[serde(default)]
    pub stream: Option<bool>,

    /// Free-form caller metadata, passed through untouched.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl CompletionRequest {
    /// A minimal request with a single user message.
    pub fn new(platform: Platform, prompt: impl Into<String>) -> Self {
        Self {
            platform,
            model: None,
            messages: vec![ChatMessage::user(prompt)],
            temperature: None,
            max_tokens: None,
            stream: None,
            metadata: BTreeMap::new(),
        }
    }
}

/// Token usage reported by a provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,
    /// Tokens in the completion.
    pub completion_tokens: u32,
    /// Sum of both.
    pub total_tokens: u32,
}

impl Usage {
    /// Build a usage from its two parts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of output.
    Stop,
    /// Hit the max token limit.
    Length,
    /// Output was filtered.
    ContentFilter,
    /// Anything else the provider reported.
    Other,
}

/// A complete (non-streaming) completion result.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionResponse {
    /// Generated text.
    pub content: String,
    /// Model that produced the text, as reported by the provider.
    pub model: String,
    /// Token usage.
    pub usage: Usage,
    /// Why generation stopped.
    pub finish_reason: Option<FinishReason>,
    /// Brand citations found by the extraction pass, when one ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
    /// Source URLs returned by search-augmented platforms. Empty elsewhere.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub source_urls: Vec<String>,
    /// Wall-clock latency of the provider call in milliseconds.
    pub latency_ms: u64,
}

/// One increment of a streaming completion.
///
/// Concatenating the deltas of a chunk sequence yields the same content a
/// non-streaming call would have returned. Only the final chunk carries
/// usage and a finish reason.
#[derive(Debug, Clone, Serialize)]
pub struct StreamChunk {
    /// Partial content delta.
    pub delta: String,
    /// Whether this is the last chunk of the stream.
    pub is_final: bool,
    /// Usage, on the final chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Finish reason, on the final chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl StreamChunk {
    /// A non-final content chunk.
    pub fn delta(delta: impl Into<String>) -> Self {
        Self {
            delta: delta.into(),
            is_final: false,
            usage: None,
            finish_reason: None,
        }
    }

    /// The terminal chunk of a stream.
    pub fn finish(usage: Option<Usage>, finish_reason: Option<FinishReason>) -> Self {
        Self {
            delta: String::new(),
            is_final: true,
            usage,
            finish_reason,
        }
    }
}
