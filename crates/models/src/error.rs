//! Error types for the larder-models crate.

/// Error type for validation failures when constructing domain records.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelsError {
    /// Returned when an observed quantity is negative or non-finite.
    #[error("invalid quantity {quantity}: must be finite and >= 0")]
    InvalidQuantity {
        /// The offending quantity value.
        quantity: f64,
    },

    /// Returned when a household size of zero is supplied.
    #[error("household size must be at least 1")]
    EmptyHousehold,

    /// Returned when quantity bounds are inverted or non-finite.
    #[error("invalid quantity bounds: min {min}, max {max}")]
    InvalidBounds {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_quantity() {
        let err = ModelsError::InvalidQuantity { quantity: -1.5 };
        assert_eq!(
            err.to_string(),
            "invalid quantity -1.5: must be finite and >= 0"
        );
    }

    #[test]
    fn display_empty_household() {
        let err = ModelsError::EmptyHousehold;
        assert_eq!(err.to_string(), "household size must be at least 1");
    }

    #[test]
    fn display_invalid_bounds() {
        let err = ModelsError::InvalidBounds { min: 4.0, max: 1.0 };
        assert_eq!(err.to_string(), "invalid quantity bounds: min 4, max 1");
    }

    #[test]
    fn error_is_send_sync_and_std_error() {
        fn assert_bounds<T: Send + Sync + std::error::Error>() {}
        assert_bounds::<ModelsError>();
    }
}
