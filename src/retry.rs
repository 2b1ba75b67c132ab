//! Retry policy family.
//!
//! Provides flexible backoff configuration for the session's retry loop:
//! - Exponential, linear, and constant backoff
//! - Jittered backoff to avoid synchronized retry storms
//! - Fibonacci backoff
//! - Cap wrapper bounding any other policy's delay
//! - Wall-clock duration-bounded backoff
//!
//! Delay calculation is a pure function of the zero-based attempt index.
//! Wall-clock state for duration-bounded policies lives in a per-request
//! [`RetryClock`], so a single policy value can serve concurrent requests.

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

/// Attempt budget sentinel for policies bounded by wall-clock time rather
/// than attempt count.
pub const UNBOUNDED_ATTEMPTS: u32 = u32::MAX;

/// Backoff curve selecting how the delay grows with the attempt index.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Backoff {
    /// `delay * backoff^attempt`.
    Exponential {
        /// Base delay for attempt 0.
        delay: Duration,
        /// Growth multiplier per attempt.
        backoff: f64,
    },
    /// `delay * (1 + backoff * attempt)`.
    Linear {
        /// Base delay for attempt 0.
        delay: Duration,
        /// Linear growth factor per attempt.
        backoff: f64,
    },
    /// A constant delay regardless of attempt index.
    Constant {
        /// The fixed delay.
        delay: Duration,
    },
    /// `delay * backoff^attempt * uniform(jitter_min, jitter_max)`,
    /// re-sampled on every call.
    Jitter {
        /// Base delay for attempt 0.
        delay: Duration,
        /// Growth multiplier per attempt.
        backoff: f64,
        /// Lower bound of the uniform jitter multiplier.
        jitter_min: f64,
        /// Upper bound of the uniform jitter multiplier.
        jitter_max: f64,
    },
    /// `delay * fib(attempt)` with `fib(0) = fib(1) = 1`.
    Fibonacci {
        /// Base delay multiplied by the Fibonacci number.
        delay: Duration,
    },
    /// `min(inner delay, max_delay)`; attempt budget inherited from the
    /// wrapped policy.
    Capped {
        /// The wrapped policy.
        inner: Box<RetryPolicy>,
        /// Upper bound applied to the wrapped policy's delay.
        max_delay: Duration,
    },
    /// `min(initial_delay * backoff^attempt, max_delay)`, with retries
    /// stopped by a wall-clock deadline instead of an attempt budget.
    DurationBounded {
        /// Base delay for attempt 0.
        initial_delay: Duration,
        /// Growth multiplier per attempt.
        backoff: f64,
        /// Upper bound on a single delay.
        max_delay: Duration,
        /// Total wall-clock budget for the logical request.
        duration: Duration,
    },
}

/// A retry policy: an attempt budget plus a backoff curve.
///
/// Policies are immutable values. `calculate_delay` is pure (modulo jitter
/// sampling) and takes the zero-based attempt index.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use sturdy_http::retry::RetryPolicy;
///
/// let policy = RetryPolicy::exponential(5, Duration::from_secs(1), 2.0);
/// assert_eq!(policy.calculate_delay(3), Duration::from_secs(8));
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    attempts: u32,
    kind: Backoff,
}

impl RetryPolicy {
    /// Exponential backoff: `delay * backoff^attempt`.
    pub fn exponential(attempts: u32, delay: Duration, backoff: f64) -> Self {
        Self {
            attempts: attempts.max(1),
            kind: Backoff::Exponential { delay, backoff },
        }
    }

    /// Linear backoff: `delay * (1 + backoff * attempt)`.
    pub fn linear(attempts: u32, delay: Duration, backoff: f64) -> Self {
        Self {
            attempts: attempts.max(1),
            kind: Backoff::Linear { delay, backoff },
        }
    }

    /// Constant backoff: the same delay between every attempt.
    pub fn constant(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            kind: Backoff::Constant { delay },
        }
    }

    /// Jittered exponential backoff with a uniform multiplier in
    /// `[jitter_min, jitter_max)`, re-sampled on every call.
    pub fn jittered(
        attempts: u32,
        delay: Duration,
        backoff: f64,
        jitter_min: f64,
        jitter_max: f64,
    ) -> Self {
        Self {
            attempts: attempts.max(1),
            kind: Backoff::Jitter {
                delay,
                backoff,
                jitter_min,
                jitter_max,
            },
        }
    }

    /// Fibonacci backoff: `delay * fib(attempt)`, `fib(0) = fib(1) = 1`.
    pub fn fibonacci(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            kind: Backoff::Fibonacci { delay },
        }
    }

    /// Caps another policy's delay at `max_delay`. The attempt budget is
    /// inherited from the wrapped policy.
    pub fn capped(inner: RetryPolicy, max_delay: Duration) -> Self {
        Self {
            attempts: inner.attempts,
            kind: Backoff::Capped {
                inner: Box::new(inner),
                max_delay,
            },
        }
    }

    /// Capped exponential backoff bounded by total wall-clock time instead
    /// of an attempt count. The attempt budget is the [`UNBOUNDED_ATTEMPTS`]
    /// sentinel; the real stopping condition is a [`RetryClock`] started at
    /// the beginning of each logical request.
    pub fn duration_bounded(
        initial_delay: Duration,
        backoff: f64,
        max_delay: Duration,
        duration: Duration,
    ) -> Self {
        Self {
            attempts: UNBOUNDED_ATTEMPTS,
            kind: Backoff::DurationBounded {
                initial_delay,
                backoff,
                max_delay,
                duration,
            },
        }
    }

    /// Maximum number of attempts permitted by this policy.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns the backoff curve.
    pub fn kind(&self) -> &Backoff {
        &self.kind
    }

    /// Wall-clock budget for duration-bounded policies, `None` otherwise.
    pub fn deadline(&self) -> Option<Duration> {
        match &self.kind {
            Backoff::DurationBounded { duration, .. } => Some(*duration),
            Backoff::Capped { inner, .. } => inner.deadline(),
            _ => None,
        }
    }

    /// Calculates the delay before the retry following the given zero-based
    /// attempt index.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let secs = match &self.kind {
            Backoff::Exponential { delay, backoff } => {
                delay.as_secs_f64() * backoff.powi(attempt_exp(attempt))
            }
            Backoff::Linear { delay, backoff } => {
                delay.as_secs_f64() * (1.0 + backoff * f64::from(attempt))
            }
            Backoff::Constant { delay } => delay.as_secs_f64(),
            Backoff::Jitter {
                delay,
                backoff,
                jitter_min,
                jitter_max,
            } => {
                let base = delay.as_secs_f64() * backoff.powi(attempt_exp(attempt));
                let factor = jitter_min + rand::rng().random::<f64>() * (jitter_max - jitter_min);
                base * factor
            }
            Backoff::Fibonacci { delay } => delay.as_secs_f64() * fib(attempt),
            Backoff::Capped { inner, max_delay } => {
                return inner.calculate_delay(attempt).min(*max_delay);
            }
            Backoff::DurationBounded {
                initial_delay,
                backoff,
                max_delay,
                ..
            } => (initial_delay.as_secs_f64() * backoff.powi(attempt_exp(attempt)))
                .min(max_delay.as_secs_f64()),
        };

        // Guard against non-finite results from extreme exponents.
        if secs.is_finite() && secs >= 0.0 {
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        } else {
            Duration::MAX
        }
    }
}

/// Clamps the attempt index into `powi` range.
fn attempt_exp(attempt: u32) -> i32 {
    i32::try_from(attempt).unwrap_or(i32::MAX)
}

/// Iterative Fibonacci with `fib(0) = fib(1) = 1`, computed in `f64` so
/// large attempt indices saturate instead of overflowing.
fn fib(n: u32) -> f64 {
    let (mut a, mut b) = (1.0_f64, 1.0_f64);
    for _ in 0..n {
        let next = a + b;
        a = b;
        b = next;
    }
    a
}

/// Per-request wall-clock state for duration-bounded policies.
///
/// The clock is started once at the beginning of a logical request and
/// consulted before every subsequent attempt; keeping it outside
/// [`RetryPolicy`] lets one policy value serve concurrent requests without
/// shared timer state.
#[derive(Debug, Clone, Copy)]
pub struct RetryClock {
    started: Instant,
    limit: Duration,
}

impl RetryClock {
    /// Starts a clock with the given wall-clock budget.
    pub fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    /// Elapsed time since the clock was started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Returns `true` while the wall-clock budget has not been spent.
    pub fn should_retry(&self) -> bool {
        self.elapsed() < self.limit
    }
}
