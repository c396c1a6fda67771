//! Provider adapters for the supported LLM platforms.

pub(crate) mod anthropic;
pub(crate) mod google;
pub(crate) mod openai;
pub(crate) mod perplexity;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use config::ProviderConfig;
use futures::Stream;

use crate::{
    error::LlmError,
    messages::{CompletionRequest, CompletionResponse, Platform, StreamChunk},
};

/// Type alias for a stream of completion chunks.
///
/// The stream is pinned and boxed to allow dynamic dispatch across provider
/// implementations.
pub type CompletionStream = Pin<Box<dyn Stream<Item = crate::Result<StreamChunk>> + Send>>;

/// Trait for LLM provider implementations.
///
/// Adapters are stateless aside from their immutable configuration (API
/// key, base URL), so one instance is safely shared across concurrent calls.
///
/// Note for async_trait: the trait must be dyn-compatible, so plain async
/// trait functions without Box/Pin are not an option.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The platform this adapter talks to.
    fn platform(&self) -> Platform;

    /// The model used when a request names none.
    fn default_model(&self) -> &str;

    /// Resolve the request's model id to the name sent upstream.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::ModelNotFound` when the id is outside the
    /// configured model set.
    fn upstream_model(&self, request: &CompletionRequest) -> crate::Result<String>;

    /// Process a completion request.
    async fn complete(&self, request: &CompletionRequest) -> crate::Result<CompletionResponse>;

    /// Process a streaming completion request.
    ///
    /// Returns a stream of chunks sent incrementally as the model generates
    /// its response. Concatenating the deltas yields the full content.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::UnsupportedCapability` if the platform does not
    /// support streaming.
    async fn stream_complete(&self, _request: &CompletionRequest) -> crate::Result<CompletionStream> {
        Err(LlmError::UnsupportedCapability(format!(
            "{} does not support streaming completions",
            self.platform()
        )))
    }

    /// Whether this adapter implements streaming completions.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Whether completions are search-augmented and return source URLs.
    fn supports_search(&self) -> bool {
        false
    }
}

/// Resolve a request's model id against a provider's configured model set.
///
/// Unknown ids fail locally, before any quota is consumed or a network
/// call is made.
pub(crate) fn resolve_upstream_model(config: &ProviderConfig, request: &CompletionRequest) -> crate::Result<String> {
    let id = request.model.as_deref().unwrap_or_else(|| config.default_model());

    config
        .resolve_model(id)
        .map(str::to_string)
        .ok_or_else(|| LlmError::ModelNotFound(format!("Model '{id}' is not configured")))
}

/// Map a non-success provider response to the error taxonomy.
///
/// Shared across adapters: 401 is fatal authentication failure, 404 a
/// missing model, 429 rate limiting with an optional Retry-After hint, and
/// the 5xx family transient.
pub(crate) async fn error_from_response(platform: Platform, response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let retry_after = parse_retry_after(&response);

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    log::error!("{platform} API error ({status}): {message}");

    match status {
        400 => LlmError::InvalidRequest(message),
        401 | 403 => LlmError::AuthenticationFailed(message),
        404 => LlmError::ModelNotFound(message),
        429 => LlmError::RateLimited { message, retry_after },
        500..=599 => LlmError::Transient { status, message },
        _ => LlmError::Protocol(format!("Unexpected status {status}: {message}")),
    }
}

/// Per-request timeout applied by every adapter's HTTP client.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Map a reqwest transport error to the taxonomy.
pub(crate) fn error_from_transport(platform: Platform, error: reqwest::Error) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout {
            elapsed: REQUEST_TIMEOUT,
        }
    } else {
        LlmError::Transient {
            status: 0,
            message: format!("Failed to reach {platform}: {error}"),
        }
    }
}

/// Seconds-form Retry-After header, when present and parseable.
fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
