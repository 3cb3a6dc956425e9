//! Error types for the larder-store crate.

use larder_checkpoint::CheckpointError;

/// Error type for all fallible store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Returned when the backing medium fails (disk, permissions, ...).
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Description of the underlying failure.
        reason: String,
    },

    /// Returned when a stored checkpoint cannot be decoded.
    #[error("corrupt checkpoint: {source}")]
    Corrupt {
        /// The decode failure.
        #[source]
        source: CheckpointError,
    },

    /// Returned when a key has no stored value and one is required.
    #[error("no checkpoint stored for '{key}'")]
    NotFound {
        /// The missing key.
        key: String,
    },
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Unavailable {
            reason: e.to_string(),
        }
    }
}

impl From<CheckpointError> for StoreError {
    fn from(source: CheckpointError) -> Self {
        StoreError::Corrupt { source }
    }
}

impl StoreError {
    /// Returns true if retrying the operation could help.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}
