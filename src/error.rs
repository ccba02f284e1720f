use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Failure shared by every caller of one batch round.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// Errors returned by [`Loader`](crate::Loader) operations.
///
/// `LoadError` is cheap to clone: a failed fetch is wrapped once in an `Arc` and the same
/// allocation is handed to every load that was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The batch function returned an error for the round this load was part of.
    #[error("batch fetch failed: {0}")]
    Fetch(SharedError),

    /// An earlier round of this loader failed; the loader no longer fetches.
    #[error("loader is poisoned by an earlier failed fetch: {0}")]
    Poisoned(SharedError),

    /// The key was rejected before it was queued.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The worker answered a load without having resolved all of its keys.
    #[error("keys were not resolved by the loader: {0}")]
    Unresolved(String),

    /// The loader was cancelled or dropped before the load resolved.
    #[error("loader was cancelled")]
    Cancelled,
}

impl LoadError {
    /// The underlying fetch failure, if this error came from one.
    pub fn shared_error(&self) -> Option<&SharedError> {
        match self {
            LoadError::Fetch(e) | LoadError::Poisoned(e) => Some(e),
            LoadError::InvalidKey(_) | LoadError::Unresolved(_) | LoadError::Cancelled => None,
        }
    }

    /// Returns true when both errors carry the very same fetch failure.
    pub fn same_failure(&self, other: &LoadError) -> bool {
        match (self.shared_error(), other.shared_error()) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("connection reset")]
    struct ConnectionReset;

    #[test]
    fn clones_share_the_failure() {
        let shared: SharedError = Arc::new(ConnectionReset);
        let fetch = LoadError::Fetch(shared.clone());
        let poisoned = LoadError::Poisoned(shared);

        assert!(fetch.same_failure(&fetch.clone()));
        assert!(fetch.same_failure(&poisoned));
        assert!(!fetch.same_failure(&LoadError::Fetch(Arc::new(ConnectionReset))));
        assert!(!LoadError::Cancelled.same_failure(&LoadError::Cancelled));
        assert_eq!(fetch.to_string(), "batch fetch failed: connection reset");
    }
}
