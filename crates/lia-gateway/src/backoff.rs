//! Exponential backoff between reconnect attempts

use std::time::Duration;

/// Backoff curve: `initial_delay * multiplier^(attempt - 1)`, capped at `max_delay`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(120),
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    /// Delay before the given attempt (1-based). Attempt 0 waits nothing.
    ///
    /// Multipliers below 1 (and NaN) are treated as 1 so delays never shrink.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(1_024) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        // float-to-int casts saturate, so an overflowing curve lands on the cap
        let delay_millis = (self.initial_delay.as_millis() as f64 * factor) as u64;
        Duration::from_millis(delay_millis).min(self.max_delay)
    }
}

/// Stateful backoff counter owned by a session.
///
/// Never shared across sessions; `reset` after any successful handshake.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    attempts: u32,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Count one more failed attempt and return how long to wait before the next
    pub fn next_delay(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        self.config.delay_for_attempt(self.attempts)
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Consecutive failures since the last reset
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_for_attempt() {
        let config = BackoffConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        };

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(6), Duration::from_secs(32));
        assert_eq!(config.delay_for_attempt(7), Duration::from_secs(60)); // capped
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_delays_never_decrease_until_reset() {
        let mut backoff = ExponentialBackoff::new(BackoffConfig {
            initial_delay: Duration::from_millis(300),
            max_delay: Duration::from_secs(10),
            multiplier: 1.5,
        });

        let mut previous = Duration::ZERO;
        for _ in 0..50 {
            let delay = backoff.next_delay();
            assert!(delay >= previous);
            assert!(delay <= Duration::from_secs(10));
            previous = delay;
        }
        assert_eq!(backoff.attempts(), 50);

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(300));
    }

    #[test]
    fn test_shrinking_multiplier_holds_the_initial_delay() {
        let mut backoff = ExponentialBackoff::new(BackoffConfig {
            initial_delay: Duration::from_secs(8),
            max_delay: Duration::from_secs(60),
            multiplier: 0.5,
        });

        let delays: Vec<Duration> = (0..4).map(|_| backoff.next_delay()).collect();
        assert_eq!(delays, vec![Duration::from_secs(8); 4]);
    }

    #[test]
    fn test_nan_multiplier_does_not_collapse_to_zero() {
        let config = BackoffConfig {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            multiplier: f64::NAN,
        };

        for attempt in 1..10 {
            assert_eq!(config.delay_for_attempt(attempt), Duration::from_millis(250));
        }
    }
}
