//! Error types for the larder-trainer crate.

use larder_models::ItemId;
use larder_ssm::SsmError;
use larder_store::StoreError;

/// Error type for all fallible trainer operations.
///
/// Every variant is a structured value; nothing crosses this crate's
/// boundary as a raw string.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    /// Returned when an observation is negative, NaN, or infinite. The
    /// entry is unchanged and stats are not updated.
    #[error("invalid observation for '{item_id}': {reason}")]
    InvalidObservation {
        /// Item the observation was for.
        item_id: ItemId,
        /// Why it was rejected.
        reason: String,
    },

    /// Returned when a backfill observation is older than the
    /// acceptance window.
    #[error(
        "stale observation for '{item_id}': {age_days} days older than last, window is {window_days}"
    )]
    StaleObservation {
        /// Item the observation was for.
        item_id: ItemId,
        /// How far behind the last processed observation it is.
        age_days: i64,
        /// Configured backfill window.
        window_days: i64,
    },

    /// Returned when a filter update produced a numerically invalid
    /// state. The entry has been rewound to its last persisted
    /// checkpoint and an immediate retrain has been flagged.
    #[error("numerical fault for '{item_id}': {source}")]
    NumericalFault {
        /// Item whose update faulted.
        item_id: ItemId,
        /// The underlying numerical failure.
        #[source]
        source: SsmError,
    },

    /// Returned when a store operation failed after retries.
    #[error("store failure")]
    Store(#[from] StoreError),

    /// Returned when a full retrain failed; the prior entry remains
    /// active.
    #[error("retrain failed for '{item_id}': {reason}")]
    RetrainFailed {
        /// Item whose retrain failed.
        item_id: ItemId,
        /// Why it failed.
        reason: String,
    },

    /// Returned when a cooperative cancellation signal was observed.
    #[error("operation cancelled")]
    Cancelled,

    /// Returned when an operation exceeded its deadline.
    #[error("operation '{operation}' timed out after {seconds} s")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The configured cap in seconds.
        seconds: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_observation() {
        let err = TrainError::InvalidObservation {
            item_id: ItemId::from("milk"),
            reason: "quantity is NaN".to_string(),
        };
        assert_eq!(err.to_string(), "invalid observation for 'milk': quantity is NaN");
    }

    #[test]
    fn display_stale_observation() {
        let err = TrainError::StaleObservation {
            item_id: ItemId::from("milk"),
            age_days: 120,
            window_days: 90,
        };
        assert_eq!(
            err.to_string(),
            "stale observation for 'milk': 120 days older than last, window is 90"
        );
    }

    #[test]
    fn display_timeout() {
        let err = TrainError::Timeout {
            operation: "retrain",
            seconds: 30,
        };
        assert_eq!(err.to_string(), "operation 'retrain' timed out after 30 s");
    }

    #[test]
    fn display_cancelled() {
        assert_eq!(TrainError::Cancelled.to_string(), "operation cancelled");
    }

    #[test]
    fn error_is_send_sync_and_std_error() {
        fn assert_bounds<T: Send + Sync + std::error::Error>() {}
        assert_bounds::<TrainError>();
    }
}
