//! Rolling training statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rolling error statistics for one item's model.
///
/// `mae` and `rmse` are running means over all consumption observations
/// folded so far; `ewma_error` is an exponentially weighted average of the
/// *signed* innovation, so persistent bias shows up even when its magnitude
/// is small.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrainingStats {
    /// Mean absolute one-step prediction error.
    pub mae: f64,
    /// Root mean squared one-step prediction error.
    pub rmse: f64,
    /// Exponentially weighted moving average of the signed error.
    pub ewma_error: f64,
    /// Number of observations folded into these statistics.
    pub observations_seen: u64,
    /// Timestamp of the most recent update, if any.
    pub last_update_at: Option<DateTime<Utc>>,
}

impl TrainingStats {
    /// Returns zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one signed prediction error into the statistics.
    pub fn update(&mut self, error: f64, alpha: f64, at: DateTime<Utc>) {
        let n = self.observations_seen + 1;
        let nf = n as f64;
        self.mae += (error.abs() - self.mae) / nf;
        let mse = self.rmse * self.rmse + (error * error - self.rmse * self.rmse) / nf;
        self.rmse = mse.sqrt();
        self.ewma_error = if self.observations_seen == 0 {
            error
        } else {
            alpha * error + (1.0 - alpha) * self.ewma_error
        };
        self.observations_seen = n;
        self.last_update_at = Some(at);
    }
}
