//! Retry and backoff policy for failed analyzer tasks.
//!
//! The policy is a pure decision function over a task's attempt count and
//! the configured parameters. It holds no shared state and performs no
//! side effects, so it is unit-testable in isolation; the coordinator acts
//! on its decisions.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Decision for a task that just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-queue the task after the given delay
    RetryAfter(Duration),
    /// Attempt limit reached; the task is to be abandoned
    GiveUp,
}

/// Bounded exponential backoff with jitter.
///
/// The delay for attempt `n` (1-based) is
/// `base_delay * multiplier^(n-1)`, clamped to `max_delay`, with a random
/// jitter of up to `jitter_factor` in either direction. The jittered sample
/// always stays inside the envelope reported by [`RetryPolicy::delay_bounds`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts per task, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper clamp on the computed delay
    pub max_delay: Duration,
    /// Exponential growth factor between consecutive retries
    pub multiplier: f64,
    /// Random jitter range as a fraction of the delay (0.0-1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Decide what to do with a task that has failed `attempts_made` times.
    ///
    /// `attempts_made` counts every dispatch so far, including the one that
    /// just failed. Returns [`RetryDecision::GiveUp`] once the attempt limit
    /// is reached.
    #[must_use]
    pub fn next_attempt(&self, attempts_made: u32) -> RetryDecision {
        if attempts_made >= self.max_attempts {
            return RetryDecision::GiveUp;
        }

        let base = self.unjittered_delay(attempts_made);
        let delay = if self.jitter_factor > 0.0 {
            let spread = base.as_secs_f64() * self.jitter_factor;
            let offset = rand::rng().random_range(-spread..=spread);
            Duration::from_secs_f64((base.as_secs_f64() + offset).max(0.0))
        } else {
            base
        };

        RetryDecision::RetryAfter(delay)
    }

    /// The deterministic delay envelope for a failure count, before jitter.
    ///
    /// Returns `None` when the policy would give up instead. Tests assert
    /// against this envelope since the sampled delay is randomized.
    #[must_use]
    pub fn delay_bounds(&self, attempts_made: u32) -> Option<(Duration, Duration)> {
        if attempts_made >= self.max_attempts {
            return None;
        }
        let base = self.unjittered_delay(attempts_made);
        let spread = base.as_secs_f64() * self.jitter_factor;
        let min = Duration::from_secs_f64((base.as_secs_f64() - spread).max(0.0));
        let max = Duration::from_secs_f64(base.as_secs_f64() + spread);
        Some((min, max))
    }

    fn unjittered_delay(&self, attempts_made: u32) -> Duration {
        let exponent = attempts_made.saturating_sub(1);
        let factor = self.multiplier.powi(exponent as i32);
        let raw = self.base_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(raw.min(self.max_delay.as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn test_gives_up_at_max_attempts() {
        let p = policy();
        assert_eq!(p.next_attempt(3), RetryDecision::GiveUp);
        assert_eq!(p.next_attempt(4), RetryDecision::GiveUp);
        assert!(p.delay_bounds(3).is_none());
    }

    #[test]
    fn test_exponential_growth_without_jitter() {
        let p = policy();
        assert_eq!(
            p.next_attempt(1),
            RetryDecision::RetryAfter(Duration::from_millis(100))
        );
        assert_eq!(
            p.next_attempt(2),
            RetryDecision::RetryAfter(Duration::from_millis(200))
        );
    }

    #[test]
    fn test_delay_clamped_to_max() {
        let p = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            multiplier: 10.0,
            jitter_factor: 0.0,
        };
        assert_eq!(
            p.next_attempt(5),
            RetryDecision::RetryAfter(Duration::from_secs(4))
        );
    }

    #[test]
    fn test_jittered_delay_stays_in_bounds() {
        let p = RetryPolicy {
            jitter_factor: 0.5,
            ..policy()
        };
        let (min, max) = p
            .delay_bounds(2)
            .expect("attempt 2 of 3 should still retry");

        for _ in 0..100 {
            match p.next_attempt(2) {
                RetryDecision::RetryAfter(d) => {
                    assert!(d >= min, "delay {d:?} below envelope minimum {min:?}");
                    assert!(d <= max, "delay {d:?} above envelope maximum {max:?}");
                }
                RetryDecision::GiveUp => panic!("attempt 2 of 3 must not give up"),
            }
        }
    }

    #[test]
    fn test_single_attempt_policy_never_retries() {
        let p = RetryPolicy {
            max_attempts: 1,
            ..policy()
        };
        assert_eq!(p.next_attempt(1), RetryDecision::GiveUp);
    }
}
