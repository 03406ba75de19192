//! Structured error model for graph store operations.
//!
//! [`StoreError`] carries a classified [`ErrorKind`] so the retry layer can
//! decide whether and how long to back off without inspecting driver
//! internals. Classification is an ordered substring table over the
//! normalized error description; the delay formula lives with the retry
//! policy so each side can be tested independently.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a store error, first match wins.
///
/// The first three kinds are the store's known transient families and are
/// always retryable (subject to the caller's attempt ceiling).
/// `TransientOther` is an error the driver reported as transient but whose
/// description matched no known family; it is retried only for a bounded
/// number of attempts. `Fatal` errors are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Query or connection-acquisition timeout.
    Timeout,
    /// Deadlock or write-lock contention.
    Lock,
    /// Connection-level failure (reset, refused, dropped).
    Connection,
    /// Transient per the driver, but unmatched by the table above.
    TransientOther,
    /// Unclassified or structural failure; never retried.
    Fatal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::Lock => "lock",
            Self::Connection => "connection",
            Self::TransientOther => "transient",
            Self::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// Ordered (predicate, kind) table evaluated against the lowercased
/// description. Order matters: "deadlock" also contains "lock", so both map
/// to the same kind, but "connection timeout" must classify as a timeout.
const CLASSIFICATION: &[(&str, ErrorKind)] = &[
    ("timed out", ErrorKind::Timeout),
    ("timeout", ErrorKind::Timeout),
    ("deadlock", ErrorKind::Lock),
    ("lock", ErrorKind::Lock),
    ("connection", ErrorKind::Connection),
];

impl ErrorKind {
    /// Classify an error description. Unmatched descriptions fall through to
    /// [`ErrorKind::TransientOther`]; the caller decides whether the source
    /// error family justifies treating it as transient at all.
    #[must_use]
    pub fn classify(description: &str) -> Self {
        let normalized = description.to_lowercase();
        for (needle, kind) in CLASSIFICATION {
            if normalized.contains(needle) {
                return *kind;
            }
        }
        Self::TransientOther
    }
}

/// Error from a graph store operation, classified for retry decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{kind}] {message}")]
pub struct StoreError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StoreError {
    /// Transient error: the kind is derived from the description via the
    /// classification table.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: ErrorKind::classify(&message),
            message,
        }
    }

    /// Fatal error: never retried, propagates to the caller.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Fatal,
            message: message.into(),
        }
    }

    /// Construct with an explicit kind (used by test doubles and adapters
    /// that have richer taxonomy information than the description alone).
    #[must_use]
    pub fn with_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// True for every kind except [`ErrorKind::Fatal`]. The retry policy may
    /// still decline based on the attempt ceiling.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind != ErrorKind::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_first_match_wins() {
        // "connection timeout" contains both needles; timeout is listed first.
        assert_eq!(ErrorKind::classify("Connection timeout"), ErrorKind::Timeout);
        assert_eq!(ErrorKind::classify("transaction timed out"), ErrorKind::Timeout);
        assert_eq!(ErrorKind::classify("DeadlockDetected"), ErrorKind::Lock);
        assert_eq!(ErrorKind::classify("could not acquire lock"), ErrorKind::Lock);
        assert_eq!(ErrorKind::classify("connection reset by peer"), ErrorKind::Connection);
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(ErrorKind::classify("LOCK client terminated"), ErrorKind::Lock);
    }

    #[test]
    fn unmatched_description_is_transient_other() {
        assert_eq!(
            ErrorKind::classify("some unknown driver error"),
            ErrorKind::TransientOther
        );
    }

    #[test]
    fn fatal_is_not_transient() {
        let err = StoreError::fatal("syntax error in query");
        assert!(!err.is_transient());
        assert_eq!(err.kind, ErrorKind::Fatal);
    }

    #[test]
    fn transient_constructor_classifies() {
        let err = StoreError::transient("Neo.TransientError.Transaction.DeadlockDetected");
        assert_eq!(err.kind, ErrorKind::Lock);
        assert!(err.is_transient());
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = StoreError::transient("connection refused");
        assert_eq!(err.to_string(), "[connection] connection refused");
    }

    #[test]
    fn serde_roundtrip() {
        let err = StoreError::with_kind(ErrorKind::Timeout, "acquisition timeout");
        let json = serde_json::to_string(&err).unwrap();
        let back: StoreError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
