//! Error types for the larder-ssm crate.

/// Error type for all fallible operations in the larder-ssm crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SsmError {
    /// Returned when the state vector or covariance picked up a NaN or
    /// infinity during an update.
    #[error("state or covariance became non-finite")]
    NonFiniteState,

    /// Returned when the innovation variance stays non-positive even
    /// after the ridge is applied.
    #[error("innovation variance {s} not positive after ridge")]
    DegenerateInnovation {
        /// The offending innovation variance.
        s: f64,
    },

    /// Returned when a confidence level outside (0, 1) is requested.
    #[error("confidence level {level} outside (0, 1)")]
    InvalidConfidence {
        /// The offending confidence level.
        level: f64,
    },
}
