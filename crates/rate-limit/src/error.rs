//! Error types for rate limiting.

use config::Platform;

use crate::storage::StorageError;
use std::time::Duration;

/// Errors that can occur during admission control.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Request rate limit exceeded for a platform.
    #[error("Request rate limit exceeded for {platform}")]
    RequestLimitExceeded {
        /// Platform that exceeded the limit.
        platform: Platform,
        /// Time to wait before retrying.
        retry_after: Duration,
    },

    /// Token rate limit exceeded for a platform.
    #[error("Token rate limit exceeded for {platform}")]
    TokenLimitExceeded {
        /// Platform that exceeded the limit.
        platform: Platform,
        /// Time to wait before retrying.
        retry_after: Duration,
    },

    /// The estimate is larger than the bucket can ever hold. Retrying will
    /// never succeed with the current configuration.
    #[error("Request needs {requested} tokens but the {platform} bucket holds at most {capacity}")]
    ExceedsCapacity {
        /// Platform whose bucket is too small.
        platform: Platform,
        /// Tokens the request asked for.
        requested: u32,
        /// Configured bucket capacity.
        capacity: u32,
    },

    /// Storage backend error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl RateLimitError {
    /// Get the retry-after duration if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RequestLimitExceeded { retry_after, .. } => Some(*retry_after),
            Self::TokenLimitExceeded { retry_after, .. } => Some(*retry_after),
            Self::ExceedsCapacity { .. } => None,
            Self::Storage(_) => None,
        }
    }
}
