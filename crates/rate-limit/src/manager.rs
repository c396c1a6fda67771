//! Rate limit manager implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use config::{Platform, PlatformRateLimits, ProviderConfig};

use crate::error::RateLimitError;
use crate::request::AdmissionRequest;
use crate::storage::{InMemoryStorage, RateLimitStorage};

/// Manager for per-platform request and token admission.
///
/// Buckets are keyed by `(platform, credential)`. Platforms without
/// configured limits are admitted unconditionally.
#[derive(Clone)]
pub struct RateLimitManager {
    limits: Arc<BTreeMap<Platform, PlatformRateLimits>>,
    storage: Arc<InMemoryStorage>,
}

impl RateLimitManager {
    /// Create a new rate limit manager with the given per-platform limits.
    pub fn new(limits: BTreeMap<Platform, PlatformRateLimits>) -> Self {
        Self {
            limits: Arc::new(limits),
            storage: Arc::new(InMemoryStorage::new()),
        }
    }

    /// Create a manager from provider configurations, taking each provider's
    /// configured rate limits.
    pub fn from_providers(providers: &BTreeMap<Platform, ProviderConfig>) -> Self {
        let limits = providers
            .iter()
            .filter_map(|(platform, provider)| Some((*platform, provider.rate_limits.clone()?)))
            .collect();

        Self::new(limits)
    }

    /// Check whether an outbound call is admitted.
    ///
    /// The request bucket is consulted first, then the token bucket with the
    /// estimated prompt token count. A call rejected by the token bucket has
    /// still consumed its request slot.
    pub async fn try_admit(&self, request: &AdmissionRequest) -> Result<(), RateLimitError> {
        let Some(limits) = self.limits.get(&request.platform) else {
            return Ok(());
        };

        if let Some(quota) = &limits.requests {
            let key = format!("requests:{}:{}", request.platform, request.credential);
            let result = self.storage.check_and_consume(&key, quota.limit, quota.interval).await?;

            if !result.allowed {
                return Err(RateLimitError::RequestLimitExceeded {
                    platform: request.platform,
                    retry_after: result.retry_after.unwrap_or_default(),
                });
            }
        }

        if let Some(quota) = &limits.tokens {
            if request.estimated_tokens == 0 {
                return Ok(());
            }

            let key = format!("tokens:{}:{}", request.platform, request.credential);

            let result = self
                .storage
                .check_and_consume_n(&key, request.estimated_tokens, quota.limit, quota.interval)
                .await?;

            if !result.allowed {
                return match result.retry_after {
                    Some(retry_after) => Err(RateLimitError::TokenLimitExceeded {
                        platform: request.platform,
                        retry_after,
                    }),
                    None => Err(RateLimitError::ExceedsCapacity {
                        platform: request.platform,
                        requested: request.estimated_tokens,
                        capacity: quota.limit,
                    }),
                };
            }
        }

        Ok(())
    }

    /// Reconcile the token bucket after actual usage is known.
    ///
    /// When the provider reports more tokens than were estimated at
    /// admission, the difference is deducted so subsequent admissions see
    /// the real consumption. The deduction is best-effort: the call already
    /// happened, so a rejection here only means the bucket is empty and
    /// future calls will wait. Over-estimates are not refunded.
    pub async fn reconcile(&self, platform: Platform, credential: &str, estimated: u32, actual: u32) {
        if actual <= estimated {
            return;
        }

        let Some(quota) = self.limits.get(&platform).and_then(|l| l.tokens.as_ref()) else {
            return;
        };

        let delta = actual - estimated;
        let key = format!("tokens:{platform}:{credential}");

        match self.storage.check_and_consume_n(&key, delta, quota.limit, quota.interval).await {
            Ok(result) if !result.allowed => {
                log::debug!("Token reconciliation for '{key}' could not deduct {delta} tokens, bucket is exhausted");
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("Token reconciliation for '{key}' failed: {e}");
            }
        }
    }
}
