//! Engine error model: classified store errors vs. opaque infrastructure
//! failures.

use graphload_types::StoreError;

/// Categorized engine error for retry decisions.
///
/// `Store` wraps a classified [`StoreError`] carrying retry metadata.
/// `Infrastructure` wraps opaque host-side errors (unreadable batch files,
/// chunk directory I/O, config problems) that are never retryable at the
/// store level.
#[derive(Debug)]
pub enum LoadError {
    /// Classified store error.
    Store(StoreError),
    /// Host-side error (filesystem, config, task join).
    Infrastructure(anyhow::Error),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(e) => write!(f, "{e}"),
            Self::Infrastructure(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<anyhow::Error> for LoadError {
    fn from(e: anyhow::Error) -> Self {
        Self::Infrastructure(e)
    }
}

impl From<StoreError> for LoadError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl LoadError {
    /// Returns `true` if this is a store error within a transient family.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            Self::Infrastructure(_) => false,
        }
    }

    /// Returns the classified store error if this is a `Store` variant.
    #[must_use]
    pub fn as_store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store(e) => Some(e),
            Self::Infrastructure(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphload_types::ErrorKind;

    #[test]
    fn store_transient_is_retryable() {
        let err = LoadError::Store(StoreError::transient("deadlock detected"));
        assert!(err.is_retryable());
        assert_eq!(err.as_store_error().unwrap().kind, ErrorKind::Lock);
    }

    #[test]
    fn store_fatal_is_not_retryable() {
        let err = LoadError::Store(StoreError::fatal("malformed query"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn infrastructure_is_not_retryable() {
        let err: LoadError = anyhow::anyhow!("chunk directory vanished").into();
        assert!(!err.is_retryable());
        assert!(err.as_store_error().is_none());
    }
}
