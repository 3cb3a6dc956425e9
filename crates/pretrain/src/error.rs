//! Error types for the larder-pretrain crate.

use larder_models::CategoryKey;
use larder_ssm::SsmError;
use larder_store::StoreError;

/// Error type for synthetic pretraining.
#[derive(Debug, thiserror::Error)]
pub enum PretrainError {
    /// Training a category model diverged numerically.
    #[error("training failed for category '{category}': {source}")]
    Training {
        /// The category being trained.
        category: CategoryKey,
        /// The numerical failure.
        #[source]
        source: SsmError,
    },

    /// Persisting a category checkpoint failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
