//! Retry policy for the HTTP fetcher.
//!
//! The backoff schedule is a pure function of the attempt number so it can be
//! tested without any transport. [`RetryPolicy::transition`] turns the outcome
//! of one attempt into the next [`AttemptState`].

use std::time::Duration;

use rand::Rng;

/// HTTP statuses that are retried with backoff.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for the exponential schedule.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Default upper bound for any single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default upper bound of the random jitter added to each delay.
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(200);

/// Exponential backoff with jitter, capped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = `max_retries + 1`).
    pub max_retries: u32,
    /// Delay before the first retry, doubled for every following retry.
    pub base_delay: Duration,
    /// Cap applied after jitter.
    pub max_delay: Duration,
    /// Jitter is drawn uniformly from `0..=max_jitter`.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

/// Where a fetch currently stands.
#[derive(Debug)]
pub enum AttemptState<T, E> {
    /// About to issue attempt number `attempt` (0-based).
    Attempting { attempt: u32 },
    /// Attempt failed with a retryable error; wait `delay`, then issue `attempt`.
    Retrying { attempt: u32, delay: Duration, error: E },
    /// Gave up. Holds the last error seen.
    Failed(E),
    /// Done.
    Succeeded(T),
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Returns a copy with the given base delay. Handy for tests.
    #[must_use]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Returns a copy with the given retry count.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay after failed attempt `attempt` (0-based) with an explicit jitter:
    /// `min(2^attempt * base + jitter, max_delay)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, jitter: Duration) -> Duration {
        let exponential = 2u32
            .checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(self.max_delay);
        exponential.saturating_add(jitter).min(self.max_delay)
    }

    /// Delay after failed attempt `attempt`, with random jitter.
    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let max_jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter_ms = if max_jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=max_jitter_ms)
        };
        self.delay_for(attempt, Duration::from_millis(jitter_ms))
    }

    /// Returns true if `status` is in the retryable set.
    #[must_use]
    pub fn is_retryable_status(status: u16) -> bool {
        RETRYABLE_STATUSES.contains(&status)
    }

    /// Advances the state machine after attempt `attempt` produced `outcome`.
    pub fn transition<T, E>(
        &self,
        attempt: u32,
        outcome: Result<T, E>,
        is_retryable: impl FnOnce(&E) -> bool,
    ) -> AttemptState<T, E> {
        match outcome {
            Ok(value) => AttemptState::Succeeded(value),
            Err(error) if attempt < self.max_retries && is_retryable(&error) => {
                AttemptState::Retrying {
                    attempt: attempt + 1,
                    delay: self.next_delay(attempt),
                    error,
                }
            }
            Err(error) => AttemptState::Failed(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0, Duration::ZERO), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1, Duration::ZERO), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2, Duration::ZERO), Duration::from_secs(4));
        assert_eq!(
            policy.delay_for(1, Duration::from_millis(150)),
            Duration::from_millis(2150)
        );
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(5, Duration::ZERO), DEFAULT_MAX_DELAY);
        assert_eq!(policy.delay_for(40, Duration::ZERO), DEFAULT_MAX_DELAY);
    }

    #[test]
    fn test_retryable_statuses() {
        for status in [429, 500, 502, 503, 504] {
            assert!(RetryPolicy::is_retryable_status(status));
        }
        for status in [400, 401, 403, 404, 501] {
            assert!(!RetryPolicy::is_retryable_status(status));
        }
    }

    #[test]
    fn test_transition_retries_then_fails_with_last_error() {
        let policy = RetryPolicy::default().with_max_retries(2);

        let state = policy.transition::<(), _>(0, Err("first"), |_| true);
        assert!(matches!(state, AttemptState::Retrying { attempt: 1, error: "first", .. }));

        let state = policy.transition::<(), _>(1, Err("second"), |_| true);
        assert!(matches!(state, AttemptState::Retrying { attempt: 2, .. }));

        let state = policy.transition::<(), _>(2, Err("third"), |_| true);
        assert!(matches!(state, AttemptState::Failed("third")));
    }

    #[test]
    fn test_transition_non_retryable_fails_immediately() {
        let policy = RetryPolicy::default();
        let state = policy.transition::<(), _>(0, Err(404), |_| false);
        assert!(matches!(state, AttemptState::Failed(404)));
    }

    #[test]
    fn test_transition_success() {
        let policy = RetryPolicy::none();
        let state = policy.transition::<_, ()>(0, Ok("body"), |_| true);
        assert!(matches!(state, AttemptState::Succeeded("body")));
    }

    proptest! {
        #[test]
        fn prop_next_delay_bounded(attempt in 0u32..64) {
            let policy = RetryPolicy::default();
            let delay = policy.next_delay(attempt);
            prop_assert!(delay <= DEFAULT_MAX_DELAY);
            prop_assert!(delay >= policy.delay_for(attempt, Duration::ZERO));
        }

        #[test]
        fn prop_schedule_non_decreasing(attempt in 0u32..32) {
            let policy = RetryPolicy::default();
            prop_assert!(
                policy.delay_for(attempt, Duration::ZERO)
                    <= policy.delay_for(attempt + 1, Duration::ZERO)
            );
        }
    }
}
