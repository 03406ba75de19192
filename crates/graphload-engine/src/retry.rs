//! Retry policy: per-kind backoff delays bounded by an attempt ceiling.
//!
//! Classification lives with [`graphload_types::ErrorKind`]; this module only
//! turns (attempt, kind) into a retry/delay decision so the two concerns can
//! be tested independently.

use std::time::Duration;

use graphload_types::{ErrorKind, StoreError};

/// Attempt ceiling for chunk loads under the parallel strategy.
pub const PARALLEL_MAX_ATTEMPTS: u32 = 8;
/// Attempt ceiling for chunk loads under the serial strategy.
pub const SERIAL_MAX_ATTEMPTS: u32 = 10;
/// Attempt ceiling for the final serial reconciliation pass.
pub const RECONCILE_MAX_ATTEMPTS: u32 = 15;
/// Unmatched-but-transient errors stop being retried past this attempt.
const TRANSIENT_OTHER_ATTEMPT_LIMIT: u32 = 7;

/// Outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryDecision {
    pub retry: bool,
    pub delay: Duration,
}

impl RetryDecision {
    fn give_up() -> Self {
        Self {
            retry: false,
            delay: Duration::ZERO,
        }
    }

    fn after_secs(secs: f64) -> Self {
        Self {
            retry: true,
            delay: Duration::from_secs_f64(secs),
        }
    }
}

/// Bounded retry policy with kind-aware backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Hard per-operation attempt ceiling; always overrides the classifier.
    pub max_attempts: u32,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Decide whether to retry after `attempt` failed attempts of one
    /// operation, and how long to sleep first.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &StoreError) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::give_up();
        }
        match delay_secs(error.kind, attempt) {
            Some(secs) => RetryDecision::after_secs(secs),
            None => RetryDecision::give_up(),
        }
    }
}

/// Backoff delay in seconds for one error kind at a given attempt number, or
/// `None` when the kind is not retryable at that attempt.
///
/// Delays grow linearly with the attempt number up to a per-kind cap:
/// lock contention backs off gently (siblings finish fast), connection
/// failures back off hardest (the server may be restarting).
#[must_use]
pub fn delay_secs(kind: ErrorKind, attempt: u32) -> Option<f64> {
    let a = f64::from(attempt);
    match kind {
        ErrorKind::Timeout => Some(10.0_f64.min(2.0 + a * 2.0)),
        ErrorKind::Lock => Some(8.0_f64.min(1.0 + a)),
        ErrorKind::Connection => Some(15.0_f64.min(3.0 + a * 3.0)),
        ErrorKind::TransientOther if attempt > TRANSIENT_OTHER_ATTEMPT_LIMIT => None,
        ErrorKind::TransientOther => Some(5.0_f64.min(1.0 + a)),
        ErrorKind::Fatal => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_delay_formula() {
        assert_eq!(delay_secs(ErrorKind::Timeout, 1), Some(4.0));
        assert_eq!(delay_secs(ErrorKind::Timeout, 3), Some(8.0));
        // Capped at 10.
        assert_eq!(delay_secs(ErrorKind::Timeout, 9), Some(10.0));
    }

    #[test]
    fn lock_delay_formula() {
        assert_eq!(delay_secs(ErrorKind::Lock, 1), Some(2.0));
        assert_eq!(delay_secs(ErrorKind::Lock, 12), Some(8.0));
    }

    #[test]
    fn connection_delay_formula() {
        assert_eq!(delay_secs(ErrorKind::Connection, 1), Some(6.0));
        assert_eq!(delay_secs(ErrorKind::Connection, 2), Some(9.0));
        assert_eq!(delay_secs(ErrorKind::Connection, 10), Some(15.0));
    }

    #[test]
    fn transient_other_stops_after_seven_attempts() {
        assert_eq!(delay_secs(ErrorKind::TransientOther, 7), Some(5.0));
        assert_eq!(delay_secs(ErrorKind::TransientOther, 8), None);
    }

    #[test]
    fn fatal_never_retries() {
        assert_eq!(delay_secs(ErrorKind::Fatal, 1), None);
    }

    #[test]
    fn ceiling_overrides_classifier() {
        let policy = RetryPolicy::new(5);
        let err = StoreError::transient("connection timeout");
        assert!(policy.should_retry(4, &err).retry);
        assert!(!policy.should_retry(5, &err).retry);
        assert!(!policy.should_retry(6, &err).retry);
    }

    #[test]
    fn unknown_error_past_limit_is_terminal() {
        let policy = RetryPolicy::new(RECONCILE_MAX_ATTEMPTS);
        let err = StoreError::transient("some unknown driver error");
        assert!(policy.should_retry(7, &err).retry);
        assert!(!policy.should_retry(8, &err).retry);
    }

    #[test]
    fn delays_are_monotone_up_to_cap() {
        for kind in [ErrorKind::Timeout, ErrorKind::Lock, ErrorKind::Connection] {
            let mut last = 0.0;
            for attempt in 1..20 {
                let d = delay_secs(kind, attempt).unwrap();
                assert!(d >= last, "{kind} delay decreased at attempt {attempt}");
                last = d;
            }
        }
    }
}
