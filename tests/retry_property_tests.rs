//! Property-based tests for the retry policy family.
//!
//! Verifies the backoff curves hold for arbitrary parameters using the
//! proptest framework: growth formulas, cap dominance, jitter bounds, and
//! Retry-After parsing robustness.

use std::time::Duration;

use proptest::prelude::*;
use sturdy_http::retry::RetryPolicy;
use sturdy_http::session::parse_retry_after;

/// Strategy for base delays between 1ms and 10s.
fn base_delay_strategy() -> impl Strategy<Value = Duration> {
    (1u64..10_000).prop_map(Duration::from_millis)
}

/// Strategy for backoff multipliers in a sane range.
fn multiplier_strategy() -> impl Strategy<Value = f64> {
    1.0f64..4.0
}

proptest! {
    #[test]
    fn exponential_matches_formula(
        delay in base_delay_strategy(),
        backoff in multiplier_strategy(),
        attempt in 0u32..12,
    ) {
        let policy = RetryPolicy::exponential(5, delay, backoff);
        let expected = delay.as_secs_f64() * backoff.powi(attempt as i32);
        let actual = policy.calculate_delay(attempt).as_secs_f64();
        prop_assert!((actual - expected).abs() < 1e-9 * expected.max(1.0));
    }

    #[test]
    fn exponential_is_nondecreasing(
        delay in base_delay_strategy(),
        backoff in multiplier_strategy(),
        attempt in 0u32..12,
    ) {
        let policy = RetryPolicy::exponential(5, delay, backoff);
        prop_assert!(policy.calculate_delay(attempt + 1) >= policy.calculate_delay(attempt));
    }

    #[test]
    fn linear_matches_formula(
        delay in base_delay_strategy(),
        backoff in 0.0f64..4.0,
        attempt in 0u32..32,
    ) {
        let policy = RetryPolicy::linear(5, delay, backoff);
        let expected = delay.as_secs_f64() * (1.0 + backoff * f64::from(attempt));
        let actual = policy.calculate_delay(attempt).as_secs_f64();
        prop_assert!((actual - expected).abs() < 1e-9 * expected.max(1.0));
    }

    #[test]
    fn constant_ignores_attempt(
        delay in base_delay_strategy(),
        attempt in 0u32..100,
    ) {
        let policy = RetryPolicy::constant(3, delay);
        prop_assert_eq!(policy.calculate_delay(attempt), delay);
    }

    #[test]
    fn cap_dominates_any_inner_policy(
        delay in base_delay_strategy(),
        backoff in multiplier_strategy(),
        cap_ms in 1u64..5_000,
        attempt in 0u32..20,
    ) {
        let cap = Duration::from_millis(cap_ms);
        let inner = RetryPolicy::exponential(5, delay, backoff);
        let policy = RetryPolicy::capped(inner, cap);
        prop_assert!(policy.calculate_delay(attempt) <= cap);
    }

    #[test]
    fn capped_equals_inner_below_cap(
        delay in base_delay_strategy(),
        attempt in 0u32..10,
    ) {
        // A cap far above any reachable delay must be a no-op.
        let inner = RetryPolicy::linear(5, delay, 1.0);
        let expected = inner.calculate_delay(attempt);
        let policy = RetryPolicy::capped(inner, Duration::from_secs(1_000_000));
        prop_assert_eq!(policy.calculate_delay(attempt), expected);
    }

    #[test]
    fn jitter_stays_within_bounds(
        delay in base_delay_strategy(),
        backoff in multiplier_strategy(),
        attempt in 0u32..8,
    ) {
        let policy = RetryPolicy::jittered(3, delay, backoff, 0.5, 1.5);
        let base = delay.as_secs_f64() * backoff.powi(attempt as i32);
        for _ in 0..16 {
            let sampled = policy.calculate_delay(attempt).as_secs_f64();
            prop_assert!(sampled >= base * 0.5 - 1e-9);
            prop_assert!(sampled <= base * 1.5 + 1e-9);
        }
    }

    #[test]
    fn fibonacci_recurrence_holds(
        delay in base_delay_strategy(),
        attempt in 0u32..20,
    ) {
        let policy = RetryPolicy::fibonacci(3, delay);
        let a = policy.calculate_delay(attempt).as_secs_f64();
        let b = policy.calculate_delay(attempt + 1).as_secs_f64();
        let c = policy.calculate_delay(attempt + 2).as_secs_f64();
        prop_assert!((c - (a + b)).abs() < 1e-6 * c.max(1.0));
    }

    #[test]
    fn duration_bounded_never_exceeds_max_delay(
        initial in base_delay_strategy(),
        backoff in multiplier_strategy(),
        max_ms in 1u64..10_000,
        attempt in 0u32..30,
    ) {
        let max_delay = Duration::from_millis(max_ms);
        let policy = RetryPolicy::duration_bounded(
            initial,
            backoff,
            max_delay,
            Duration::from_secs(300),
        );
        prop_assert!(policy.calculate_delay(attempt) <= max_delay);
    }

    #[test]
    fn parse_retry_after_numeric_roundtrip(secs in 0u32..100_000) {
        let parsed = parse_retry_after(&secs.to_string());
        prop_assert_eq!(parsed, Duration::from_secs(u64::from(secs)));
    }

    #[test]
    fn parse_retry_after_never_panics(value in "\\PC{0,64}") {
        // Arbitrary garbage must resolve to some non-negative wait.
        let _ = parse_retry_after(&value);
    }
}
