//! Unified monitoring client over multiple LLM platforms.
//!
//! One façade dispatches completion requests to provider adapters
//! (OpenAI, Anthropic, Perplexity, Google), with admission control before
//! every call, retry with backoff on retryable failures, cost accounting on
//! every result, and concurrent fan-out for brand monitoring.

mod client;
mod error;
mod messages;
mod monitor;
mod provider;
mod request;
mod retry;
pub mod token_counter;

pub use client::MonitorClient;
pub use error::LlmError;
pub use messages::{
    ChatMessage, ChatRole, CompletionRequest, CompletionResponse, FinishReason, Platform, StreamChunk, Usage,
};
pub use monitor::{JobStatus, MonitorJob, PlatformOutcome};
pub use provider::{CompletionStream, Provider};
pub use request::{RequestContext, extract_context};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LlmError>;
