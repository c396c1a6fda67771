//! In-memory rate limit storage using the governor crate.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{InsufficientCapacity, Quota, RateLimiter};
use mini_moka::sync::Cache;
use tokio::sync::Mutex;

use super::{RateLimitResult, RateLimitStorage, StorageError};

type KeyedRateLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// In-memory rate limit storage implementation.
pub struct InMemoryStorage {
    /// Cache of rate limiters by quota configuration.
    limiters: Cache<String, Arc<KeyedRateLimiter>>,
    /// Lock to prevent thundering herd when creating rate limiters.
    /// Maps cache key to a lock for that specific configuration.
    creation_locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Burst policy for a quota.
#[derive(Clone, Copy)]
enum BurstPolicy {
    /// 10% of the limit, minimum 5. Used for request admission, where
    /// traffic should be smoothed over the interval.
    Fraction,
    /// The full limit. Used for token admission, where a single call may
    /// legitimately need a large share of the window.
    Full,
}

impl BurstPolicy {
    fn cache_prefix(self) -> &'static str {
        match self {
            BurstPolicy::Fraction => "req",
            BurstPolicy::Full => "tok",
        }
    }
}

impl InMemoryStorage {
    /// Create a new in-memory storage instance.
    pub fn new() -> Self {
        let limiters = Cache::builder()
            .max_capacity(10000)
            .time_to_idle(Duration::from_secs(3600))
            .build();

        Self {
            limiters,
            creation_locks: DashMap::new(),
        }
    }

    /// Get or create the shared rate limiter for a quota configuration.
    ///
    /// Limiters are cached by configuration rather than by key: the keyed
    /// limiter tracks independent state per key internally, so keys with the
    /// same quota can share one instance.
    async fn limiter(
        &self,
        policy: BurstPolicy,
        limit: u32,
        interval: Duration,
    ) -> Result<Arc<KeyedRateLimiter>, StorageError> {
        let interval_millis = interval.as_millis();
        let cache_key = format!("{}:{limit}-{interval_millis}ms", policy.cache_prefix());

        if let Some(limiter) = self.limiters.get(&cache_key) {
            return Ok(limiter);
        }

        let creation_lock = self
            .creation_locks
            .entry(cache_key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = creation_lock.lock().await;

        // Another task may have created it while we waited for the lock.
        if let Some(limiter) = self.limiters.get(&cache_key) {
            drop(_guard);
            self.creation_locks.remove(&cache_key);
            return Ok(limiter);
        }

        let quota = quota_from_config(policy, limit, interval)?;
        let limiter = Arc::new(RateLimiter::keyed(quota));

        self.limiters.insert(cache_key.clone(), limiter.clone());
        log::debug!("Created new rate limiter instance for configuration: {cache_key}");

        drop(_guard);
        self.creation_locks.remove(&cache_key);

        Ok(limiter)
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitStorage for InMemoryStorage {
    async fn check_and_consume(
        &self,
        key: &str,
        limit: u32,
        interval: Duration,
    ) -> Result<RateLimitResult, StorageError> {
        log::debug!("Checking rate limit for key '{key}': {limit} requests allowed per {interval:?}");

        let limiter = self.limiter(BurstPolicy::Fraction, limit, interval).await?;

        match limiter.check_key(&key.to_string()) {
            Ok(_) => Ok(RateLimitResult {
                allowed: true,
                retry_after: None,
            }),
            Err(not_until) => {
                let retry_after = not_until.wait_time_from(DefaultClock::default().now());
                log::debug!("Request blocked for key '{key}' - rate limit exceeded, retry after {retry_after:?}");

                Ok(RateLimitResult {
                    allowed: false,
                    retry_after: Some(retry_after),
                })
            }
        }
    }

    async fn check_and_consume_n(
        &self,
        key: &str,
        units: u32,
        limit: u32,
        interval: Duration,
    ) -> Result<RateLimitResult, StorageError> {
        log::debug!("Checking token rate limit for key '{key}': consuming {units} tokens out of {limit} per {interval:?}");

        let limiter = self.limiter(BurstPolicy::Full, limit, interval).await?;

        let n = NonZeroU32::new(units)
            .ok_or_else(|| StorageError::Internal("Token count must be greater than zero".to_string()))?;

        // check_key_n consumes all n units atomically or none at all.
        match limiter.check_key_n(&key.to_string(), n) {
            Ok(Ok(())) => Ok(RateLimitResult {
                allowed: true,
                retry_after: None,
            }),
            Ok(Err(not_until)) => {
                let retry_after = not_until.wait_time_from(DefaultClock::default().now());
                log::debug!(
                    "Token request blocked for key '{key}' - cannot consume all {units} tokens, retry after {retry_after:?}"
                );

                Ok(RateLimitResult {
                    allowed: false,
                    retry_after: Some(retry_after),
                })
            }
            Err(InsufficientCapacity(_)) => {
                log::warn!("Token request for key '{key}' requires {units} tokens but rate limit capacity is insufficient");

                // This request can never succeed, so there is no retry hint.
                Ok(RateLimitResult {
                    allowed: false,
                    retry_after: None,
                })
            }
        }
    }
}

/// Creates the governor quota for a limit/interval pair.
///
/// The configured "X units per Y" window is converted to the per-second rate
/// governor works with internally, with a minimum of one per second so a
/// valid configuration never becomes a zero rate.
fn quota_from_config(policy: BurstPolicy, limit: u32, interval: Duration) -> Result<Quota, StorageError> {
    let per_second_f64 = (limit as f64 / interval.as_secs_f64()).max(1.0);
    let per_second = per_second_f64 as u32;

    let burst = match policy {
        BurstPolicy::Fraction => (limit / 10).max(5).min(limit),
        BurstPolicy::Full => limit,
    };

    let per_second = per_second
        .try_into()
        .map_err(|_| StorageError::Internal(format!("Invalid per-second rate: {per_second}")))?;

    let burst = burst
        .try_into()
        .map_err(|_| StorageError::Internal(format!("Invalid burst size: {burst}")))?;

    Ok(Quota::per_second(per_second).allow_burst(burst))
}
