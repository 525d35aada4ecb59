use std::time::Duration;

/// How long a job waits before it is retried after a recoverable error.
///
/// Every variant is clamped so a delay never exceeds its maximum.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// `base * multiplier^attempt`, optionally spread by a deterministic jitter.
    Exponential {
        base: Duration,
        max: Duration,
        multiplier: f64,
        /// Stretch each delay by 0-40% depending on the attempt so jobs that
        /// failed together do not all come back at once.
        jitter: bool,
    },
    /// `delay * (attempt + 1)`, clamped to `max`.
    Linear { delay: Duration, max: Duration },
    /// The same delay every time.
    Constant { delay: Duration },
}

impl RetryStrategy {
    /// Doubling backoff without jitter, from millisecond settings.
    pub fn exponential_ms(base_ms: u64, max_ms: u64) -> Self {
        Self::Exponential {
            base: Duration::from_millis(base_ms),
            max: Duration::from_millis(max_ms),
            multiplier: 2.0,
            jitter: false,
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    ///
    /// ```
    /// use std::time::Duration;
    /// use courier_queue::RetryStrategy;
    ///
    /// let strategy = RetryStrategy::Constant { delay: Duration::from_secs(1) };
    /// assert_eq!(strategy.delay_for(0), Duration::from_secs(1));
    /// assert_eq!(strategy.delay_for(5), Duration::from_secs(1));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::Exponential {
                base,
                max,
                multiplier,
                jitter,
            } => {
                // Retry limits are small; the cast cannot wrap.
                #[allow(clippy::cast_possible_wrap)]
                let raw = base.as_secs_f64() * multiplier.powi(attempt as i32);
                let adjusted = if *jitter {
                    raw * (1.0 + 0.1 * f64::from(attempt % 5))
                } else {
                    raw
                };
                Duration::from_secs_f64(adjusted.min(max.as_secs_f64()))
            }
            Self::Linear { delay, max } => {
                let raw = delay.as_secs_f64() * f64::from(attempt + 1);
                Duration::from_secs_f64(raw.min(max.as_secs_f64()))
            }
            Self::Constant { delay } => *delay,
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(300),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_doubles_and_clamps() {
        let strategy = RetryStrategy::exponential_ms(100, 1_000);
        assert_eq!(strategy.delay_for(0), Duration::from_millis(100));
        assert_eq!(strategy.delay_for(1), Duration::from_millis(200));
        assert_eq!(strategy.delay_for(3), Duration::from_millis(800));
        assert_eq!(strategy.delay_for(4), Duration::from_secs(1));
        assert_eq!(strategy.delay_for(20), Duration::from_secs(1));
    }

    #[test]
    fn jitter_repeats_every_five_attempts() {
        let strategy = RetryStrategy::Exponential {
            base: Duration::from_millis(100),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: true,
        };
        assert_eq!(strategy.delay_for(0), Duration::from_millis(100));
        assert_eq!(strategy.delay_for(1), Duration::from_millis(220));
        assert_eq!(strategy.delay_for(5), Duration::from_millis(3200));
    }

    #[test]
    fn linear_grows_and_clamps() {
        let strategy = RetryStrategy::Linear {
            delay: Duration::from_millis(500),
            max: Duration::from_secs(2),
        };
        assert_eq!(strategy.delay_for(0), Duration::from_millis(500));
        assert_eq!(strategy.delay_for(2), Duration::from_millis(1500));
        assert_eq!(strategy.delay_for(9), Duration::from_secs(2));
    }

    #[test]
    fn constant_never_changes() {
        let strategy = RetryStrategy::Constant {
            delay: Duration::from_millis(250),
        };
        assert!((0..10).all(|a| strategy.delay_for(a) == Duration::from_millis(250)));
    }
}
