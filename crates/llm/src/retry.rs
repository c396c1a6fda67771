//! Explicit backoff state for retryable failures.

use std::time::Duration;

use config::RetryConfig;
use rand::Rng;

/// Tracks retry attempts for one operation.
///
/// Delays double from the base per failed attempt, are capped, and carry a
/// small random jitter so synchronized callers spread out. A provider's
/// retry-after hint, when longer than the computed delay, wins.
pub(crate) struct Backoff {
    attempt: u32,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Backoff {
    pub(crate) fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay,
            max_delay: config.max_delay,
        }
    }

    /// The delay before the next attempt, or `None` when the attempt budget
    /// is exhausted.
    pub(crate) fn next_delay(&mut self, retry_after_hint: Option<Duration>) -> Option<Duration> {
        self.attempt += 1;

        if self.attempt >= self.max_attempts {
            return None;
        }

        let exponent = self.attempt.saturating_sub(1).min(16);
        let computed = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);

        let jitter_budget = computed.as_millis() as u64 / 10;
        let jitter = if jitter_budget == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_budget))
        };

        let delay = computed + jitter;

        Some(match retry_after_hint {
            Some(hint) if hint > delay => hint,
            _ => delay,
        })
    }

    /// Attempts made so far, including the initial one.
    pub(crate) fn attempts(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        }
    }

    #[test]
    fn delays_double_then_cap() {
        let mut backoff = Backoff::new(&config(4));

        let first = backoff.next_delay(None).unwrap();
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(110));

        let second = backoff.next_delay(None).unwrap();
        assert!(second >= Duration::from_millis(200) && second <= Duration::from_millis(220));

        // 400ms computed, capped at 350ms before jitter.
        let third = backoff.next_delay(None).unwrap();
        assert!(third >= Duration::from_millis(350) && third <= Duration::from_millis(385));

        assert!(backoff.next_delay(None).is_none());
    }

    #[test]
    fn budget_counts_the_initial_attempt() {
        let mut backoff = Backoff::new(&config(3));

        assert!(backoff.next_delay(None).is_some());
        assert!(backoff.next_delay(None).is_some());
        assert!(backoff.next_delay(None).is_none());
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn longer_retry_after_hint_wins() {
        let mut backoff = Backoff::new(&config(3));

        let delay = backoff.next_delay(Some(Duration::from_secs(2))).unwrap();
        assert_eq!(delay, Duration::from_secs(2));

        // A hint shorter than the computed delay is ignored.
        let delay = backoff.next_delay(Some(Duration::from_millis(1))).unwrap();
        assert!(delay >= Duration::from_millis(200));
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        let mut backoff = Backoff::new(&config(0));
        assert!(backoff.next_delay(None).is_none());
    }
}
