//! Error taxonomy for the monitoring client.

use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use config::Platform;
use serde::Serialize;
use thiserror::Error;

/// Monitoring client errors.
///
/// The taxonomy separates fatal errors, surfaced immediately, from retryable
/// ones the client retries locally with backoff before surfacing.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No adapter is configured for the requested platform.
    #[error("Provider '{0}' not found")]
    ProviderNotFound(Platform),

    /// Model not found at the provider.
    #[error("Model '{0}' not found")]
    ModelNotFound(String),

    /// Authentication failed (missing or invalid API key).
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The platform does not implement the requested capability.
    #[error("Unsupported capability: {0}")]
    UnsupportedCapability(String),

    /// The provider's response could not be understood.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Rate limited, either by local admission control or by the provider.
    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        /// Human-readable description.
        message: String,
        /// Suggested wait before the next attempt, when known.
        retry_after: Option<Duration>,
    },

    /// Transient upstream failure (5xx, connection reset).
    #[error("Transient provider error ({status}): {message}")]
    Transient {
        /// HTTP status, 0 for connection-level failures.
        status: u16,
        /// Error detail.
        message: String,
    },

    /// The call exceeded its deadline.
    #[error("Timed out after {elapsed:?}")]
    Timeout {
        /// How long the call ran before being cut off.
        elapsed: Duration,
    },

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,

    /// Internal error.
    /// If Some(message), it came from a provider and can be shown.
    /// If None, it is internal and details should not leak.
    #[error("Internal error")]
    Internal(Option<String>),
}

impl LlmError {
    /// Whether the client should retry this error locally.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Transient { .. } | Self::Timeout { .. }
        )
    }

    /// Suggested wait before the next attempt, when the error carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Get the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::UnsupportedCapability(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            Self::ProviderNotFound(_) | Self::ModelNotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Transient { .. } | Self::Protocol(_) => StatusCode::BAD_GATEWAY,
            Self::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string for the response.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::UnsupportedCapability(_) => "unsupported_capability",
            Self::AuthenticationFailed(_) => "authentication_error",
            Self::ProviderNotFound(_) | Self::ModelNotFound(_) => "not_found_error",
            Self::RateLimited { .. } => "rate_limit_error",
            Self::Timeout { .. } => "timeout_error",
            Self::Transient { .. } => "transient_error",
            Self::Protocol(_) => "protocol_error",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Error response format for the HTTP surface.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    message: String,
    r#type: String,
    code: u16,
}

impl IntoResponse for LlmError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            match &self {
                Self::Internal(Some(provider_msg)) => {
                    log::error!("Provider returned internal error: {provider_msg}");
                }
                Self::Internal(None) => {
                    // Full details are logged where the error was created.
                    log::error!("Internal server error occurred");
                }
                _ => {
                    log::error!("Server error ({}): {}", status.as_u16(), self);
                }
            }
        }

        let message = match &self {
            Self::Internal(Some(provider_msg)) => provider_msg.clone(),
            Self::Internal(None) => "Internal error".to_string(),
            _ => self.to_string(),
        };

        let error_response = ErrorResponse {
            error: ErrorDetails {
                message,
                r#type: self.error_type().to_string(),
                code: status.as_u16(),
            },
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<rate_limit::RateLimitError> for LlmError {
    fn from(error: rate_limit::RateLimitError) -> Self {
        match &error {
            rate_limit::RateLimitError::ExceedsCapacity { .. } => Self::InvalidRequest(error.to_string()),
            _ => Self::RateLimited {
                retry_after: error.retry_after(),
                message: error.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(
            LlmError::RateLimited {
                message: "slow down".into(),
                retry_after: None,
            }
            .is_retryable()
        );
        assert!(
            LlmError::Transient {
                status: 503,
                message: "overloaded".into(),
            }
            .is_retryable()
        );
        assert!(
            LlmError::Timeout {
                elapsed: Duration::from_secs(5),
            }
            .is_retryable()
        );

        assert!(!LlmError::AuthenticationFailed("bad key".into()).is_retryable());
        assert!(!LlmError::ModelNotFound("gpt-x".into()).is_retryable());
        assert!(!LlmError::Cancelled.is_retryable());
        assert!(!LlmError::Protocol("truncated body".into()).is_retryable());
    }

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            LlmError::ProviderNotFound(Platform::Cohere).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            LlmError::RateLimited {
                message: String::new(),
                retry_after: None,
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            LlmError::Timeout {
                elapsed: Duration::ZERO,
            }
            .status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
