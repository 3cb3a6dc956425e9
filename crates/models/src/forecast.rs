//! Forecast records produced by the forecast service.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::ItemId;

/// One forecasting run for one item over one horizon.
///
/// The trajectory vectors all have `horizon_days` entries, one per day
/// starting the day after `created_at`. Records are overwritten per
/// `(item_id, horizon_days)` by later runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Unique id of this forecasting run.
    pub forecast_id: Uuid,
    /// Item the forecast is for.
    pub item_id: ItemId,
    /// When the forecast was generated.
    pub created_at: DateTime<Utc>,
    /// Checkpoint version of the model that produced it.
    pub model_version: u64,
    /// Forecast horizon in days.
    pub horizon_days: u32,
    /// Predicted mean quantity per day.
    pub trajectory: Vec<f64>,
    /// Lower confidence band, clipped at 0.
    pub lower: Vec<f64>,
    /// Upper confidence band.
    pub upper: Vec<f64>,
    /// First day the predicted quantity crosses the low-stock threshold.
    pub predicted_runout_date: Option<NaiveDate>,
    /// Confidence in the runout prediction, in [0, 1].
    pub confidence: f64,
    /// Suggested order date (runout minus the configured lead time).
    pub recommended_order_date: Option<NaiveDate>,
    /// Suggested restock quantity.
    pub recommended_quantity: f64,
    /// Names of the features fed to the model.
    pub features_used: Vec<String>,
    /// Actual runout date, filled in later for accuracy measurement.
    pub actual_runout_date: Option<NaiveDate>,
}

impl Forecast {
    /// Days from `from` until the predicted runout, if one was predicted.
    pub fn days_until_runout(&self, from: NaiveDate) -> Option<i64> {
        self.predicted_runout_date
            .map(|d| (d - from).num_days())
    }
}
