use proptest::prelude::*;

use graphload_engine::retry::{delay_secs, RetryPolicy, RECONCILE_MAX_ATTEMPTS};
use graphload_engine::scheduler::{select_strategy, Strategy, SERIAL_CHUNK_THRESHOLD};
use graphload_types::{ErrorKind, StoreError};

proptest! {
    #[test]
    fn delays_never_shrink_as_attempts_grow(attempt in 1_u32..50) {
        for kind in [ErrorKind::Timeout, ErrorKind::Lock, ErrorKind::Connection] {
            let now = delay_secs(kind, attempt).expect("known transient kinds always delay");
            let next = delay_secs(kind, attempt + 1).expect("known transient kinds always delay");
            prop_assert!(next >= now);
        }
    }

    #[test]
    fn delays_stay_within_per_kind_caps(attempt in 1_u32..1000) {
        prop_assert!(delay_secs(ErrorKind::Timeout, attempt).unwrap() <= 10.0);
        prop_assert!(delay_secs(ErrorKind::Lock, attempt).unwrap() <= 8.0);
        prop_assert!(delay_secs(ErrorKind::Connection, attempt).unwrap() <= 15.0);
    }

    #[test]
    fn ceiling_always_overrides_the_classifier(
        max_attempts in 1_u32..20,
        attempt in 0_u32..40,
    ) {
        let policy = RetryPolicy::new(max_attempts);
        let err = StoreError::with_kind(ErrorKind::Lock, "deadlock detected");
        let decision = policy.should_retry(attempt, &err);
        if attempt >= max_attempts {
            prop_assert!(!decision.retry);
        } else {
            prop_assert!(decision.retry);
        }
    }

    #[test]
    fn fatal_errors_are_never_retried(attempt in 0_u32..40) {
        let policy = RetryPolicy::new(RECONCILE_MAX_ATTEMPTS);
        let err = StoreError::fatal("constraint violation");
        prop_assert!(!policy.should_retry(attempt, &err).retry);
    }

    #[test]
    fn unmatched_transients_stop_after_the_bounded_window(attempt in 1_u32..40) {
        let policy = RetryPolicy::new(RECONCILE_MAX_ATTEMPTS);
        let err = StoreError::with_kind(ErrorKind::TransientOther, "mystery hiccup");
        let decision = policy.should_retry(attempt, &err);
        // Retryable only within both the kind's window and the ceiling.
        prop_assert_eq!(decision.retry, attempt <= 7 && attempt < RECONCILE_MAX_ATTEMPTS);
    }

    #[test]
    fn strategy_is_serial_exactly_when_expected(
        chunk_count in 0_usize..100,
        contention_prone in any::<bool>(),
    ) {
        let strategy = select_strategy(chunk_count, contention_prone);
        let expect_serial = chunk_count > SERIAL_CHUNK_THRESHOLD || contention_prone;
        prop_assert_eq!(
            strategy,
            if expect_serial { Strategy::Serial } else { Strategy::Parallel }
        );
    }
}
