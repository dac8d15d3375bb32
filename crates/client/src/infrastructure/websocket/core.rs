//! Reconnection backoff math.
//!
//! Free of any socket handling so it can be tested without a runtime.

use std::time::Duration;

use rand::Rng;

// Defaults mirrored by the environment config
pub const INITIAL_RETRY_DELAY_MS: u64 = 1_000;
pub const MAX_RETRY_DELAY_MS: u64 = 30_000;
pub const MAX_RETRY_ATTEMPTS: u32 = 10;
pub const BACKOFF_MULTIPLIER: f64 = 2.0;
pub const JITTER_FACTOR: f64 = 0.2;

/// Configuration for reconnect behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry
    pub initial_delay_ms: u64,
    /// Cap on exponential growth
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// `None` retries forever
    pub max_attempts: Option<u32>,
    /// Jitter factor (0.0-1.0), applied as ± around each delay
    pub jitter_factor: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: INITIAL_RETRY_DELAY_MS,
            max_delay_ms: MAX_RETRY_DELAY_MS,
            multiplier: BACKOFF_MULTIPLIER,
            max_attempts: Some(MAX_RETRY_ATTEMPTS),
            jitter_factor: JITTER_FACTOR,
        }
    }
}

/// Exponential backoff state shared by reconnect logic.
#[derive(Debug, Clone, Copy)]
pub struct BackoffState {
    policy: ReconnectPolicy,
    attempts: u32,
    delay_ms: u64,
}

impl Default for BackoffState {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

impl BackoffState {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            delay_ms: policy.initial_delay_ms,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.policy);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.policy.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.policy
            .max_attempts
            .is_some_and(|max| self.attempts >= max)
    }

    /// Advance to the next attempt, updating the delay for the subsequent attempt.
    ///
    /// Returns the (jittered) delay to wait *before* performing this attempt, or
    /// `None` once the attempt budget is spent.
    pub fn next_delay_and_advance(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        let current_delay = self.delay_ms;
        self.attempts += 1;
        self.delay_ms = ((self.delay_ms as f64) * self.policy.multiplier)
            .min(self.policy.max_delay_ms as f64) as u64;

        Some(Duration::from_millis(self.apply_jitter(current_delay)))
    }

    fn apply_jitter(&self, delay_ms: u64) -> u64 {
        let jitter_range = (delay_ms as f64 * self.policy.jitter_factor.clamp(0.0, 1.0)) as i64;
        if jitter_range > 0 {
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (delay_ms as i64 + jitter).max(0) as u64
        } else {
            delay_ms
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(max_attempts: Option<u32>) -> ReconnectPolicy {
        ReconnectPolicy {
            jitter_factor: 0.0,
            max_attempts,
            ..ReconnectPolicy::default()
        }
    }

    #[test]
    fn test_delays_double_until_capped() {
        let mut backoff = BackoffState::new(no_jitter(None));
        let delays: Vec<u64> = (0..7)
            .map(|_| backoff.next_delay_and_advance().unwrap().as_millis() as u64)
            .collect();

        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000]);
    }

    #[test]
    fn test_exhausts_after_max_attempts() {
        let mut backoff = BackoffState::new(no_jitter(Some(2)));
        assert!(backoff.next_delay_and_advance().is_some());
        assert!(backoff.next_delay_and_advance().is_some());
        assert!(backoff.is_exhausted());
        assert!(backoff.next_delay_and_advance().is_none());

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(
            backoff.next_delay_and_advance(),
            Some(Duration::from_millis(1_000))
        );
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let mut backoff = BackoffState::new(ReconnectPolicy {
            max_attempts: None,
            ..ReconnectPolicy::default()
        });
        let delay = backoff.next_delay_and_advance().unwrap().as_millis() as u64;
        assert!((800..=1_200).contains(&delay), "delay {delay} out of range");
    }
}
