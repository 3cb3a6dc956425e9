//! Forecast facade configuration.

use std::time::Duration;

/// Configuration for a [`crate::ForecastService`].
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    default_confidence: f64,
    horizon_max_days: u32,
    order_lead_days: i64,
    minimum_order_unit: f64,
    low_stock_confidence: f64,
    batch_max_parallel: usize,
    batch_item_timeout: Duration,
}

impl Default for ForecastConfig {
    /// Returns the documented defaults.
    ///
    /// | Key | Default |
    /// |-----|---------|
    /// | `default_confidence` | 0.95 |
    /// | `horizon_max_days` | 90 |
    /// | `order_lead_days` | 3 |
    /// | `minimum_order_unit` | 1.0 |
    /// | `low_stock_confidence` | 0.5 |
    /// | `batch_max_parallel` | 4 |
    /// | `batch_item_timeout` | 1 s |
    fn default() -> Self {
        Self {
            default_confidence: 0.95,
            horizon_max_days: 90,
            order_lead_days: 3,
            minimum_order_unit: 1.0,
            low_stock_confidence: 0.5,
            batch_max_parallel: 4,
            batch_item_timeout: Duration::from_secs(1),
        }
    }
}

impl ForecastConfig {
    /// Sets the trajectory band confidence level.
    pub fn with_default_confidence(mut self, confidence: f64) -> Self {
        self.default_confidence = confidence;
        self
    }

    /// Returns the trajectory band confidence level.
    pub fn default_confidence(&self) -> f64 {
        self.default_confidence
    }

    /// Sets the clamp on forecast horizons.
    pub fn with_horizon_max_days(mut self, days: u32) -> Self {
        self.horizon_max_days = days;
        self
    }

    /// Returns the clamp on forecast horizons.
    pub fn horizon_max_days(&self) -> u32 {
        self.horizon_max_days
    }

    /// Sets the offset from run-out to order-by.
    pub fn with_order_lead_days(mut self, days: i64) -> Self {
        self.order_lead_days = days;
        self
    }

    /// Returns the offset from run-out to order-by.
    pub fn order_lead_days(&self) -> i64 {
        self.order_lead_days
    }

    /// Sets the smallest orderable quantity.
    pub fn with_minimum_order_unit(mut self, unit: f64) -> Self {
        self.minimum_order_unit = unit;
        self
    }

    /// Returns the smallest orderable quantity.
    pub fn minimum_order_unit(&self) -> f64 {
        self.minimum_order_unit
    }

    /// Sets the confidence floor for low-stock listings.
    pub fn with_low_stock_confidence(mut self, confidence: f64) -> Self {
        self.low_stock_confidence = confidence;
        self
    }

    /// Returns the confidence floor for low-stock listings.
    pub fn low_stock_confidence(&self) -> f64 {
        self.low_stock_confidence
    }

    /// Sets the bounded fan-out for batch forecasts.
    pub fn with_batch_max_parallel(mut self, parallel: usize) -> Self {
        self.batch_max_parallel = parallel.max(1);
        self
    }

    /// Returns the bounded fan-out for batch forecasts.
    pub fn batch_max_parallel(&self) -> usize {
        self.batch_max_parallel
    }

    /// Sets the per-item deadline in batch forecasts.
    pub fn with_batch_item_timeout(mut self, timeout: Duration) -> Self {
        self.batch_item_timeout = timeout;
        self
    }

    /// Returns the per-item deadline in batch forecasts.
    pub fn batch_item_timeout(&self) -> Duration {
        self.batch_item_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documentation() {
        let config = ForecastConfig::default();
        assert_eq!(config.default_confidence(), 0.95);
        assert_eq!(config.horizon_max_days(), 90);
        assert_eq!(config.order_lead_days(), 3);
        assert_eq!(config.minimum_order_unit(), 1.0);
        assert_eq!(config.low_stock_confidence(), 0.5);
        assert_eq!(config.batch_max_parallel(), 4);
        assert_eq!(config.batch_item_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn builder_overrides() {
        let config = ForecastConfig::default()
            .with_horizon_max_days(30)
            .with_order_lead_days(5)
            .with_batch_max_parallel(2);
        assert_eq!(config.horizon_max_days(), 30);
        assert_eq!(config.order_lead_days(), 5);
        assert_eq!(config.batch_max_parallel(), 2);
    }

    #[test]
    fn batch_parallel_floor_is_one() {
        let config = ForecastConfig::default().with_batch_max_parallel(0);
        assert_eq!(config.batch_max_parallel(), 1);
    }
}
