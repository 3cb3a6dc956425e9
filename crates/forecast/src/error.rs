//! Error types for the larder-forecast crate.

use larder_models::ItemId;
use larder_ssm::SsmError;
use larder_store::StoreError;
use larder_trainer::TrainError;

/// Error type for all fallible facade operations.
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    /// Returned when the requested horizon is outside `[1, max]`.
    #[error("horizon {requested} days outside [1, {max}]")]
    HorizonExceeded {
        /// Requested horizon.
        requested: u32,
        /// Configured maximum.
        max: u32,
    },

    /// A trainer-level failure (invalid observation, stale backfill,
    /// numerical fault, unknown item, ...).
    #[error(transparent)]
    Train(#[from] TrainError),

    /// A store failure after retries.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Trajectory simulation failed.
    #[error("simulation failed for '{item_id}': {source}")]
    Simulation {
        /// Item being forecast.
        item_id: ItemId,
        /// The numerical failure.
        #[source]
        source: SsmError,
    },

    /// The item has no stored forecast to operate on.
    #[error("unknown item '{item_id}': no forecast on record")]
    UnknownItem {
        /// The unknown item.
        item_id: ItemId,
    },

    /// The per-item deadline elapsed during a batch forecast.
    #[error("forecast for '{item_id}' timed out")]
    Timeout {
        /// Item whose forecast timed out.
        item_id: ItemId,
    },

    /// A cooperative cancellation signal was observed.
    #[error("operation cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_horizon_exceeded() {
        let err = ForecastError::HorizonExceeded {
            requested: 120,
            max: 90,
        };
        assert_eq!(err.to_string(), "horizon 120 days outside [1, 90]");
    }

    #[test]
    fn display_timeout() {
        let err = ForecastError::Timeout {
            item_id: ItemId::from("milk"),
        };
        assert_eq!(err.to_string(), "forecast for 'milk' timed out");
    }

    #[test]
    fn display_unknown_item() {
        let err = ForecastError::UnknownItem {
            item_id: ItemId::from("ghost"),
        };
        assert_eq!(err.to_string(), "unknown item 'ghost': no forecast on record");
    }

    #[test]
    fn train_error_passes_through() {
        let err: ForecastError = TrainError::Cancelled.into();
        assert_eq!(err.to_string(), "operation cancelled");
    }

    #[test]
    fn error_is_send_sync_and_std_error() {
        fn assert_bounds<T: Send + Sync + std::error::Error>() {}
        assert_bounds::<ForecastError>();
    }
}
