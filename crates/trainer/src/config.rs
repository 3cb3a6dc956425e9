//! Trainer configuration.

use std::time::Duration;

use chrono::FixedOffset;

/// Configuration for an [`crate::OnlineTrainer`].
///
/// Use the builder methods to customize; the defaults match the
/// documented configuration keys.
///
/// # Example
///
/// ```ignore
/// use larder_trainer::TrainerConfig;
///
/// let config = TrainerConfig::default()
///     .with_ewma_alpha(0.2)
///     .with_retrain_interval_days(14);
/// ```
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    ewma_alpha: f64,
    learning_rate: f64,
    retrain_interval_days: i64,
    retrain_error_factor: f64,
    min_persist_interval: Duration,
    backfill_window_days: i64,
    registry_capacity: usize,
    restock_buffer: f64,
    max_retrain_passes: u32,
    retrain_mse_tol: f64,
    retrain_timeout: Duration,
    timezone: FixedOffset,
}

impl Default for TrainerConfig {
    /// Returns the documented defaults.
    ///
    /// | Key | Default |
    /// |-----|---------|
    /// | `ewma_alpha` | 0.3 |
    /// | `learning_rate` | 1e-3 |
    /// | `retrain_interval_days` | 7 |
    /// | `retrain_error_factor` | 0.5 (of `quantity_max`) |
    /// | `min_persist_interval` | 60 s |
    /// | `backfill_window_days` | 90 |
    /// | `registry_capacity` | 1024 entries |
    /// | `restock_buffer` | 0.05 units |
    /// | `max_retrain_passes` | 3 |
    /// | `retrain_mse_tol` | 0.01 |
    /// | `retrain_timeout` | 30 s |
    /// | `timezone` | UTC |
    fn default() -> Self {
        Self {
            ewma_alpha: 0.3,
            learning_rate: 1e-3,
            retrain_interval_days: 7,
            retrain_error_factor: 0.5,
            min_persist_interval: Duration::from_secs(60),
            backfill_window_days: 90,
            registry_capacity: 1024,
            restock_buffer: 0.05,
            max_retrain_passes: 3,
            retrain_mse_tol: 0.01,
            retrain_timeout: Duration::from_secs(30),
            timezone: FixedOffset::east_opt(0).expect("zero offset is always valid"),
        }
    }
}

impl TrainerConfig {
    /// Sets the EWMA stabilizer weight on gradient-updated parameters.
    pub fn with_ewma_alpha(mut self, alpha: f64) -> Self {
        self.ewma_alpha = alpha;
        self
    }

    /// Returns the EWMA stabilizer weight.
    pub fn ewma_alpha(&self) -> f64 {
        self.ewma_alpha
    }

    /// Sets the gradient step size on `B`.
    pub fn with_learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    /// Returns the gradient step size.
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Sets the periodic full-retrain cadence in days.
    pub fn with_retrain_interval_days(mut self, days: i64) -> Self {
        self.retrain_interval_days = days;
        self
    }

    /// Returns the periodic full-retrain cadence in days.
    pub fn retrain_interval_days(&self) -> i64 {
        self.retrain_interval_days
    }

    /// Sets the early-retrain trigger as a fraction of `quantity_max`.
    pub fn with_retrain_error_factor(mut self, factor: f64) -> Self {
        self.retrain_error_factor = factor;
        self
    }

    /// Returns the early-retrain trigger factor.
    pub fn retrain_error_factor(&self) -> f64 {
        self.retrain_error_factor
    }

    /// Sets the rate limit between checkpoint writes.
    pub fn with_min_persist_interval(mut self, interval: Duration) -> Self {
        self.min_persist_interval = interval;
        self
    }

    /// Returns the rate limit between checkpoint writes.
    pub fn min_persist_interval(&self) -> Duration {
        self.min_persist_interval
    }

    /// Sets the oldest acceptable backfill age in days.
    pub fn with_backfill_window_days(mut self, days: i64) -> Self {
        self.backfill_window_days = days;
        self
    }

    /// Returns the oldest acceptable backfill age in days.
    pub fn backfill_window_days(&self) -> i64 {
        self.backfill_window_days
    }

    /// Sets the bounded registry capacity (entries).
    pub fn with_registry_capacity(mut self, capacity: usize) -> Self {
        self.registry_capacity = capacity.max(1);
        self
    }

    /// Returns the registry capacity.
    pub fn registry_capacity(&self) -> usize {
        self.registry_capacity
    }

    /// Sets the quantity increase treated as measurement noise rather
    /// than a restock.
    pub fn with_restock_buffer(mut self, buffer: f64) -> Self {
        self.restock_buffer = buffer;
        self
    }

    /// Returns the restock detection buffer.
    pub fn restock_buffer(&self) -> f64 {
        self.restock_buffer
    }

    /// Sets the maximum number of passes over history in a full retrain.
    pub fn with_max_retrain_passes(mut self, passes: u32) -> Self {
        self.max_retrain_passes = passes.max(1);
        self
    }

    /// Returns the maximum number of retrain passes.
    pub fn max_retrain_passes(&self) -> u32 {
        self.max_retrain_passes
    }

    /// Sets the relative MSE change below which retraining stops early.
    pub fn with_retrain_mse_tol(mut self, tol: f64) -> Self {
        self.retrain_mse_tol = tol;
        self
    }

    /// Returns the retrain MSE tolerance.
    pub fn retrain_mse_tol(&self) -> f64 {
        self.retrain_mse_tol
    }

    /// Sets the per-item retrain deadline.
    pub fn with_retrain_timeout(mut self, timeout: Duration) -> Self {
        self.retrain_timeout = timeout;
        self
    }

    /// Returns the per-item retrain deadline.
    pub fn retrain_timeout(&self) -> Duration {
        self.retrain_timeout
    }

    /// Sets the timezone used for feature extraction.
    pub fn with_timezone(mut self, timezone: FixedOffset) -> Self {
        self.timezone = timezone;
        self
    }

    /// Returns the feature extraction timezone.
    pub fn timezone(&self) -> FixedOffset {
        self.timezone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documentation() {
        let config = TrainerConfig::default();
        assert_eq!(config.ewma_alpha(), 0.3);
        assert_eq!(config.learning_rate(), 1e-3);
        assert_eq!(config.retrain_interval_days(), 7);
        assert_eq!(config.retrain_error_factor(), 0.5);
        assert_eq!(config.min_persist_interval(), Duration::from_secs(60));
        assert_eq!(config.backfill_window_days(), 90);
        assert_eq!(config.registry_capacity(), 1024);
        assert_eq!(config.restock_buffer(), 0.05);
        assert_eq!(config.max_retrain_passes(), 3);
        assert_eq!(config.retrain_mse_tol(), 0.01);
        assert_eq!(config.retrain_timeout(), Duration::from_secs(30));
        assert_eq!(config.timezone().local_minus_utc(), 0);
    }

    #[test]
    fn builder_overrides() {
        let config = TrainerConfig::default()
            .with_ewma_alpha(0.2)
            .with_learning_rate(1e-2)
            .with_retrain_interval_days(14)
            .with_registry_capacity(16)
            .with_min_persist_interval(Duration::ZERO);
        assert_eq!(config.ewma_alpha(), 0.2);
        assert_eq!(config.learning_rate(), 1e-2);
        assert_eq!(config.retrain_interval_days(), 14);
        assert_eq!(config.registry_capacity(), 16);
        assert_eq!(config.min_persist_interval(), Duration::ZERO);
    }

    #[test]
    fn registry_capacity_floor_is_one() {
        let config = TrainerConfig::default().with_registry_capacity(0);
        assert_eq!(config.registry_capacity(), 1);
    }

    #[test]
    fn config_is_send_and_sync() {
        fn assert_impl<T: Send + Sync>() {}
        assert_impl::<TrainerConfig>();
    }
}
