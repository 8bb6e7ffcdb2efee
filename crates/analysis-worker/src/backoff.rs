//! Exponential backoff with full jitter.

use std::time::Duration;

use rand::Rng;

#[derive(Clone, Debug)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    /// Consecutive failures tolerated before giving up
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

pub struct Backoff {
    policy: BackoffPolicy,
    attempts: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Upper bound of the delay for the current attempt: `base * 2^attempts`, capped.
    fn ceiling(&self) -> Duration {
        let factor = 2u32.saturating_pow(self.attempts);
        self.policy.base.saturating_mul(factor).min(self.policy.max)
    }

    /// Delay before the next retry, or `None` once attempts are used up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.policy.max_attempts {
            return None;
        }
        let ceiling = self.ceiling().as_millis() as u64;
        self.attempts += 1;
        Some(Duration::from_millis(rand::rng().random_range(0..=ceiling)))
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
