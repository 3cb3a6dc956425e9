//! The forecasting facade.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rayon::prelude::*;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use larder_features::{FeatureBuilder, FEATURE_DIM, FEATURE_NAMES};
use larder_models::{Forecast, ItemDescriptor, ItemId, ObservationSource, TrainingStats};
use larder_store::{
    with_retry, AuditAction, AuditEvent, AuditOutcome, AuditSink, ForecastStore, ObservationStore,
};
use larder_trainer::{CancelToken, ObservationUpdate, OnlineTrainer, TrainError};

use crate::config::ForecastConfig;
use crate::error::ForecastError;

/// Public facade over the trainer and stores.
///
/// Read-only with respect to all non-forecast domains: side effects are
/// checkpoint writes (through the trainer), forecast upserts, and audit
/// events.
pub struct ForecastService {
    config: ForecastConfig,
    trainer: Arc<OnlineTrainer>,
    observations: Arc<dyn ObservationStore>,
    forecasts: Arc<dyn ForecastStore>,
    audit: Arc<dyn AuditSink>,
    features: FeatureBuilder,
}

impl ForecastService {
    /// Creates the facade.
    pub fn new(
        config: ForecastConfig,
        trainer: Arc<OnlineTrainer>,
        observations: Arc<dyn ObservationStore>,
        forecasts: Arc<dyn ForecastStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let features = FeatureBuilder::new(trainer.config().timezone());
        Self {
            config,
            trainer,
            observations,
            forecasts,
            audit,
            features,
        }
    }

    /// Returns the facade configuration.
    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Feeds one observation into the item's model.
    ///
    /// Rejections (invalid or stale observations) are audited and
    /// surfaced as typed errors; the model is unchanged.
    pub fn ingest(
        &self,
        item_id: &ItemId,
        quantity: f64,
        ts: DateTime<Utc>,
        descriptor: &ItemDescriptor,
        source: ObservationSource,
    ) -> Result<ObservationUpdate, ForecastError> {
        match self
            .trainer
            .on_observation(item_id, quantity, ts, descriptor, source)
        {
            Ok(update) => Ok(update),
            Err(e @ (TrainError::InvalidObservation { .. } | TrainError::StaleObservation { .. })) => {
                self.log_audit(AuditEvent::new(
                    AuditAction::ObservationRejected,
                    Some(item_id.clone()),
                    AuditOutcome::Failure,
                    json!({ "reason": e.to_string(), "quantity": quantity }),
                ));
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Generates (and persists) a forecast for one item.
    ///
    /// Builds per-day features for `[now+1, now+horizon]`, simulates the
    /// trajectory with uncertainty bands, derives the run-out day with
    /// the probe (threshold = `quantity_min`), and fills in the order-by
    /// date and recommended quantity. The record is upserted per
    /// `(item_id, horizon_days)`.
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`ForecastError::HorizonExceeded`] | horizon outside `[1, max]` |
    /// | [`ForecastError::Simulation`] | trajectory propagation diverged |
    /// | [`ForecastError::Train`] / [`ForecastError::Store`] | trainer or store failure |
    #[tracing::instrument(skip(self, descriptor), fields(item = %item_id, horizon = horizon_days))]
    pub fn forecast(
        &self,
        item_id: &ItemId,
        horizon_days: u32,
        descriptor: &ItemDescriptor,
    ) -> Result<Forecast, ForecastError> {
        let forecast = self.build_forecast(item_id, horizon_days, descriptor, Utc::now())?;
        with_retry("forecast upsert", || self.forecasts.upsert(&forecast))?;
        self.log_audit(AuditEvent::new(
            AuditAction::ForecastGenerated,
            Some(item_id.clone()),
            AuditOutcome::Success,
            json!({
                "horizon_days": horizon_days,
                "predicted_runout_date": forecast.predicted_runout_date,
                "confidence": forecast.confidence,
                "model_version": forecast.model_version,
            }),
        ));
        Ok(forecast)
    }

    /// Forecasts many items concurrently with bounded fan-out.
    ///
    /// Results are returned in input order. Cancellation is checked
    /// before each item; cancelled and timed-out items yield typed
    /// errors, and their forecast records are either fully written or
    /// not written at all.
    pub fn batch_forecast(
        &self,
        items: &[(ItemId, ItemDescriptor)],
        horizon_days: u32,
        cancel: &CancelToken,
    ) -> Vec<Result<Forecast, ForecastError>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.batch_max_parallel())
            .build();
        let pool = match pool {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, "falling back to sequential batch forecast");
                return items
                    .iter()
                    .map(|(item_id, descriptor)| {
                        if cancel.is_cancelled() {
                            return Err(ForecastError::Cancelled);
                        }
                        self.forecast_with_deadline(item_id, horizon_days, descriptor)
                    })
                    .collect();
            }
        };

        pool.install(|| {
            items
                .par_iter()
                .map(|(item_id, descriptor)| {
                    if cancel.is_cancelled() {
                        return Err(ForecastError::Cancelled);
                    }
                    self.forecast_with_deadline(item_id, horizon_days, descriptor)
                })
                .collect()
        })
    }

    /// Items whose latest stored forecast predicts run-out within
    /// `within_days` with confidence at or above the configured floor.
    pub fn low_stock(&self, within_days: i64) -> Result<Vec<ItemId>, ForecastError> {
        let today = Utc::now().date_naive();
        let mut out = Vec::new();
        for item_id in with_retry("item enumeration", || self.observations.items())? {
            let Some(forecast) =
                with_retry("latest forecast", || self.forecasts.get_latest(&item_id))?
            else {
                continue;
            };
            if forecast.confidence < self.config.low_stock_confidence() {
                continue;
            }
            if let Some(days) = forecast.days_until_runout(today)
                && (0..=within_days).contains(&days)
            {
                out.push(item_id);
            }
        }
        out.sort();
        Ok(out)
    }

    /// Records the actual run-out date on the item's stored forecasts
    /// for accuracy measurement.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::UnknownItem`] if the item has no stored
    /// forecast.
    pub fn record_actual_runout(
        &self,
        item_id: &ItemId,
        date: NaiveDate,
    ) -> Result<(), ForecastError> {
        if with_retry("latest forecast", || self.forecasts.get_latest(item_id))?.is_none() {
            return Err(ForecastError::UnknownItem {
                item_id: item_id.clone(),
            });
        }
        with_retry("set actual runout", || {
            self.forecasts.set_actual(item_id, date)
        })?;
        info!(item = %item_id, %date, "actual runout recorded");
        Ok(())
    }

    /// Rolling model statistics for an item, if available.
    pub fn model_performance(&self, item_id: &ItemId) -> Option<TrainingStats> {
        self.trainer.performance(item_id)
    }

    // ------------------------------------------------------------------

    fn forecast_with_deadline(
        &self,
        item_id: &ItemId,
        horizon_days: u32,
        descriptor: &ItemDescriptor,
    ) -> Result<Forecast, ForecastError> {
        let started = Instant::now();
        let forecast = self.build_forecast(item_id, horizon_days, descriptor, Utc::now())?;
        if started.elapsed() > self.config.batch_item_timeout() {
            return Err(ForecastError::Timeout {
                item_id: item_id.clone(),
            });
        }
        with_retry("forecast upsert", || self.forecasts.upsert(&forecast))?;
        self.log_audit(AuditEvent::new(
            AuditAction::ForecastGenerated,
            Some(item_id.clone()),
            AuditOutcome::Success,
            json!({
                "horizon_days": horizon_days,
                "predicted_runout_date": forecast.predicted_runout_date,
                "confidence": forecast.confidence,
                "model_version": forecast.model_version,
            }),
        ));
        Ok(forecast)
    }

    /// Pure forecast computation: no store writes.
    fn build_forecast(
        &self,
        item_id: &ItemId,
        horizon_days: u32,
        descriptor: &ItemDescriptor,
        now: DateTime<Utc>,
    ) -> Result<Forecast, ForecastError> {
        if horizon_days == 0 || horizon_days > self.config.horizon_max_days() {
            return Err(ForecastError::HorizonExceeded {
                requested: horizon_days,
                max: self.config.horizon_max_days(),
            });
        }

        let snapshot = self.trainer.snapshot(item_id, descriptor)?;

        let feature_series: Vec<[f64; FEATURE_DIM]> = (1..=horizon_days as i64)
            .map(|day| self.features.build(now + Duration::days(day), descriptor))
            .collect();

        let trajectory = snapshot
            .model
            .simulate(
                &snapshot.state,
                &feature_series,
                self.config.default_confidence(),
            )
            .map_err(|source| ForecastError::Simulation {
                item_id: item_id.clone(),
                source,
            })?;

        let threshold = descriptor.quantity_min();
        let runout = snapshot
            .model
            .runout_probe(&snapshot.state, &feature_series, threshold)
            .map_err(|source| ForecastError::Simulation {
                item_id: item_id.clone(),
                source,
            })?;

        let today = now.date_naive();
        let predicted_runout_date = runout
            .days_until
            .map(|days| today + Duration::days(days as i64));
        let recommended_order_date = predicted_runout_date
            .map(|date| date - Duration::days(self.config.order_lead_days()));

        let quantity_at_runout = match runout.days_until {
            Some(days) => trajectory
                .quantities()
                .get(days as usize - 1)
                .copied()
                .unwrap_or(0.0),
            None => trajectory
                .quantities()
                .last()
                .copied()
                .unwrap_or(descriptor.quantity_max()),
        };
        let recommended_quantity = (descriptor.quantity_max() - quantity_at_runout.max(0.0)).clamp(
            self.config.minimum_order_unit(),
            descriptor.quantity_max(),
        );

        Ok(Forecast {
            forecast_id: Uuid::new_v4(),
            item_id: item_id.clone(),
            created_at: now,
            model_version: snapshot.version,
            horizon_days,
            trajectory: trajectory.quantities().to_vec(),
            lower: trajectory.lower().to_vec(),
            upper: trajectory.upper().to_vec(),
            predicted_runout_date,
            confidence: runout.confidence,
            recommended_order_date,
            recommended_quantity,
            features_used: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            actual_runout_date: None,
        })
    }

    fn log_audit(&self, event: AuditEvent) {
        if let Err(e) = self.audit.log(event) {
            warn!(error = %e, "audit sink rejected event");
        }
    }
}

impl std::fmt::Debug for ForecastService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
