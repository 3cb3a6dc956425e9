//! Error types for the larder-scheduler crate.

use larder_store::StoreError;

/// Error type for scheduler operations. Per-item retrain failures are
/// recorded as outcomes, not surfaced here; only whole-tick failures
/// are errors.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Item enumeration or another store call failed after retries.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The tick was cancelled cooperatively.
    #[error("scheduler tick cancelled")]
    Cancelled,

    /// The worker pool could not be built.
    #[error("worker pool unavailable: {reason}")]
    Pool {
        /// Description of the pool failure.
        reason: String,
    },
}
