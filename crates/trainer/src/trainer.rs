//! The online trainer.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, info, warn};

use larder_features::{FeatureBuilder, FEATURE_NAMES};
use larder_models::{ItemDescriptor, ItemId, Observation, ObservationSource, TrainingStats};
use larder_ssm::{ModelParameters, StateSpaceModel};
use larder_store::{
    with_retry, AuditAction, AuditEvent, AuditOutcome, AuditSink, ModelStore, ObservationStore,
    StoreError,
};
use larder_checkpoint::CheckpointOwner;

use crate::cancel::CancelToken;
use crate::config::TrainerConfig;
use crate::entry::{EntrySnapshot, ItemEntry};
use crate::error::TrainError;
use crate::registry::{EntryHandle, Registry};

/// Minimum history length for a full retrain to be worthwhile.
const MIN_RETRAIN_OBSERVATIONS: usize = 5;

/// Consecutive failures after which retrains pause for an item.
const RETRAIN_FAILURE_PAUSE: u32 = 3;

/// Quantity mismatch between model state and inventory record that
/// triggers a reconciliation reset before forecasting.
const RECONCILE_TOLERANCE: f64 = 0.1;

/// Cancellation check stride while folding history.
const CANCEL_STRIDE: usize = 16;

/// Supplies item descriptors to the trainer and scheduler. Implemented
/// by the host's inventory subsystem.
pub trait DescriptorProvider: Send + Sync {
    /// Returns the descriptor for an item, or `None` if the item is not
    /// known to the inventory.
    fn descriptor(&self, item_id: &ItemId) -> Option<ItemDescriptor>;
}

/// Metrics returned from folding one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservationUpdate {
    /// One-step-ahead prediction before the update (0 for restocks).
    pub prediction: f64,
    /// Signed innovation (0 for restocks).
    pub innovation: f64,
    /// True if the observation was treated as a restock event.
    pub restock: bool,
    /// True if the observation arrived out of order and the history
    /// suffix was re-filtered.
    pub refiltered: bool,
    /// Rolling statistics after the update.
    pub stats: TrainingStats,
}

/// Outcome of a full retrain.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrainOutcome {
    /// The entry was rebuilt and swapped in.
    Completed {
        /// Passes over history actually run.
        passes: u32,
        /// Mean squared innovation of the final pass.
        mse: f64,
        /// Observations folded per pass.
        observations: usize,
    },
    /// Retraining was not worthwhile (e.g. too little history); the
    /// prior entry remains active and the retrain clock still resets.
    Skipped {
        /// Why the retrain was skipped.
        reason: String,
    },
}

/// Per-item model registry and online update loop.
///
/// All mutable state lives in registry entries behind per-item mutexes;
/// the trainer itself is immutable and shareable across threads.
pub struct OnlineTrainer {
    config: TrainerConfig,
    features: FeatureBuilder,
    registry: Registry,
    observations: Arc<dyn ObservationStore>,
    models: Arc<dyn ModelStore>,
    audit: Arc<dyn AuditSink>,
}

impl OnlineTrainer {
    /// Creates a trainer over the given stores.
    pub fn new(
        config: TrainerConfig,
        observations: Arc<dyn ObservationStore>,
        models: Arc<dyn ModelStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let features = FeatureBuilder::new(config.timezone());
        let registry = Registry::new(config.registry_capacity());
        Self {
            config,
            features,
            registry,
            observations,
            models,
            audit,
        }
    }

    /// Returns the trainer configuration.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Folds one observation into the item's model.
    ///
    /// The observation is validated, appended to the observation store,
    /// Kalman-filtered into the entry (or re-filtered from scratch if it
    /// arrived out of order within the backfill window), folded into the
    /// gradient step, and persisted subject to the rate limit.
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`TrainError::InvalidObservation`] | negative, NaN, or infinite quantity |
    /// | [`TrainError::StaleObservation`] | older than the backfill window |
    /// | [`TrainError::NumericalFault`] | filter diverged; entry rewound |
    /// | [`TrainError::Store`] | store unavailable after retries |
    pub fn on_observation(
        &self,
        item_id: &ItemId,
        y_obs: f64,
        ts: DateTime<Utc>,
        descriptor: &ItemDescriptor,
        source: ObservationSource,
    ) -> Result<ObservationUpdate, TrainError> {
        if !y_obs.is_finite() || y_obs < 0.0 {
            return Err(TrainError::InvalidObservation {
                item_id: item_id.clone(),
                reason: format!("quantity {y_obs} must be finite and >= 0"),
            });
        }

        let handle = self.materialize(item_id, descriptor)?;
        let mut entry = handle.lock();

        // Out-of-order handling happens before the append so the age
        // gate never admits unbounded backfill.
        let out_of_order = entry.last_obs_ts.is_some_and(|last| ts < last);
        if out_of_order {
            let last = entry.last_obs_ts.expect("checked above");
            let age_days = (last - ts).num_days();
            if age_days > self.config.backfill_window_days() {
                return Err(TrainError::StaleObservation {
                    item_id: item_id.clone(),
                    age_days,
                    window_days: self.config.backfill_window_days(),
                });
            }
        }

        let observation = Observation::new(item_id.clone(), ts, y_obs, source)
            .expect("validated above");
        with_retry("observation append", || {
            self.observations.append(observation.clone())
        })?;

        let update = if out_of_order {
            debug!(item = %item_id, "out-of-order observation, re-filtering history");
            if let Err(e) = self.refilter(item_id, descriptor, &mut entry) {
                if matches!(e, TrainError::NumericalFault { .. }) {
                    self.rewind(item_id, descriptor, &mut entry);
                }
                return Err(e);
            }
            ObservationUpdate {
                prediction: 0.0,
                innovation: 0.0,
                restock: false,
                refiltered: true,
                stats: entry.stats,
            }
        } else {
            match self.fold(&mut entry, y_obs, ts, descriptor) {
                Ok((prediction, innovation, restock)) => ObservationUpdate {
                    prediction,
                    innovation,
                    restock,
                    refiltered: false,
                    stats: entry.stats,
                },
                Err(source) => {
                    self.rewind(item_id, descriptor, &mut entry);
                    return Err(TrainError::NumericalFault {
                        item_id: item_id.clone(),
                        source,
                    });
                }
            }
        };

        self.maybe_persist(item_id, &mut entry);
        Ok(update)
    }

    /// Snapshot of an item's model for forecasting, after reconciling
    /// the state with the inventory record's current quantity.
    pub fn snapshot(
        &self,
        item_id: &ItemId,
        descriptor: &ItemDescriptor,
    ) -> Result<EntrySnapshot, TrainError> {
        let handle = self.materialize(item_id, descriptor)?;
        let mut entry = handle.lock();
        if let Some(current) = descriptor.quantity_current()
            && (entry.state.quantity() - current).abs() > RECONCILE_TOLERANCE
        {
            debug!(
                item = %item_id,
                state_q = entry.state.quantity(),
                inventory_q = current,
                "state disagrees with inventory record, resetting quantity"
            );
            entry.state = entry.state.restocked(current);
            entry.prev_quantity = Some(current);
            entry.dirty = true;
        }
        Ok(entry.snapshot())
    }

    /// Rolling statistics for an item, if its model is resident or
    /// persisted.
    pub fn performance(&self, item_id: &ItemId) -> Option<TrainingStats> {
        if let Some(handle) = self.registry.get(item_id) {
            return Some(handle.lock().stats);
        }
        let owner = CheckpointOwner::Item(item_id.clone());
        match self.models.load(&owner) {
            Ok(Some(checkpoint)) => Some(checkpoint.stats),
            _ => None,
        }
    }

    /// Whether the item is due for a full retrain at `now`.
    ///
    /// True when the retrain interval has elapsed or the EWMA error
    /// exceeds its threshold; while retrains are paused after repeated
    /// failures, only the error trigger (or a forced retrain) applies.
    pub fn needs_retrain(
        &self,
        item_id: &ItemId,
        descriptor: &ItemDescriptor,
        now: DateTime<Utc>,
    ) -> Result<bool, TrainError> {
        let handle = self.materialize(item_id, descriptor)?;
        let entry = handle.lock();
        if entry.force_retrain {
            return Ok(true);
        }
        let error_trigger = entry.stats.ewma_error.abs()
            > self.config.retrain_error_factor() * descriptor.quantity_max();
        if entry.retrain_paused {
            return Ok(error_trigger);
        }
        let due = (now - entry.last_full_retrain_at).num_days()
            >= self.config.retrain_interval_days();
        Ok(due || error_trigger)
    }

    /// Fully re-fits an item's model from its stored history.
    ///
    /// A fresh model is rebuilt from category warm start and the
    /// history is folded in timestamp order for up to the configured
    /// number of passes, or until the MSE change drops below tolerance.
    /// The entry is replaced atomically under its lock; on failure the
    /// prior entry remains active.
    #[tracing::instrument(skip(self, descriptor, cancel), fields(item = %item_id))]
    pub fn retrain(
        &self,
        item_id: &ItemId,
        descriptor: &ItemDescriptor,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<RetrainOutcome, TrainError> {
        let handle = self.materialize(item_id, descriptor)?;
        let mut entry = handle.lock();
        let deadline = Instant::now() + self.config.retrain_timeout();

        let result = self.retrain_locked(item_id, descriptor, &mut entry, now, cancel, deadline);
        match &result {
            Ok(outcome) => {
                entry.retrain_failures = 0;
                entry.retrain_paused = false;
                entry.force_retrain = false;
                entry.last_full_retrain_at = now;
                if matches!(outcome, RetrainOutcome::Completed { .. }) {
                    self.persist(item_id, &mut entry);
                }
            }
            Err(TrainError::Cancelled) => {}
            Err(_) => {
                entry.retrain_failures += 1;
                if entry.retrain_failures >= RETRAIN_FAILURE_PAUSE {
                    entry.retrain_paused = true;
                    warn!(
                        item = %item_id,
                        failures = entry.retrain_failures,
                        "retrains paused until the error threshold trips again"
                    );
                }
            }
        }
        result
    }

    /// Persists every dirty resident entry. Called by hosts on shutdown.
    pub fn flush(&self) {
        for item_id in self.registry.resident() {
            if let Some(handle) = self.registry.get(&item_id) {
                let mut entry = handle.lock();
                if entry.dirty {
                    self.persist(&item_id, &mut entry);
                }
            }
        }
    }

    /// Drops an item's entry from the registry (item removed by the
    /// host). The final checkpoint is persisted first if dirty.
    pub fn remove(&self, item_id: &ItemId) {
        if let Some(handle) = self.registry.remove(item_id) {
            let mut entry = handle.lock();
            if entry.dirty {
                self.persist(item_id, &mut entry);
            }
        }
    }

    // ------------------------------------------------------------------
    // Materialization
    // ------------------------------------------------------------------

    /// Locates or creates the entry for an item, following the
    /// warm-start chain: per-item checkpoint, category checkpoint,
    /// defaults. Corrupt checkpoints are quarantined and fall through.
    fn materialize(
        &self,
        item_id: &ItemId,
        descriptor: &ItemDescriptor,
    ) -> Result<EntryHandle, TrainError> {
        if let Some(handle) = self.registry.get(item_id) {
            return Ok(handle);
        }

        let owner = CheckpointOwner::Item(item_id.clone());
        let entry = match self.models.load(&owner) {
            Ok(Some(checkpoint)) => {
                debug!(item = %item_id, version = checkpoint.version, "loaded item checkpoint");
                ItemEntry::from_checkpoint(&checkpoint)
            }
            Ok(None) => self.warm_entry(item_id, descriptor, false)?,
            Err(StoreError::Corrupt { source }) => {
                warn!(item = %item_id, error = %source, "corrupt checkpoint, quarantining");
                with_retry("checkpoint quarantine", || {
                    self.models.quarantine(&owner, &source.to_string())
                })?;
                self.log_audit(AuditEvent::new(
                    AuditAction::CheckpointQuarantined,
                    Some(item_id.clone()),
                    AuditOutcome::Failure,
                    json!({ "reason": source.to_string() }),
                ));
                self.warm_entry(item_id, descriptor, true)?
            }
            Err(e) => return Err(e.into()),
        };

        let (handle, evicted) = self
            .registry
            .get_or_insert(item_id.clone(), Arc::new(Mutex::new(entry)));
        if let Some((evicted_id, evicted)) = evicted {
            let mut evicted_entry = evicted.lock();
            if evicted_entry.dirty {
                self.persist(&evicted_id, &mut evicted_entry);
            }
        }
        Ok(handle)
    }

    /// Builds a fresh entry from the category warm start or defaults.
    fn warm_entry(
        &self,
        item_id: &ItemId,
        descriptor: &ItemDescriptor,
        force_retrain: bool,
    ) -> Result<ItemEntry, TrainError> {
        let (model, category_rate) = self.warm_model(descriptor);
        let current = descriptor
            .quantity_current()
            .unwrap_or(descriptor.quantity_max());
        let recent = self.recent_history(item_id)?;
        let state = model.initialize(current, &recent, category_rate, descriptor.quantity_max());
        let mut entry = ItemEntry::new(model, state, Utc::now());
        entry.force_retrain = force_retrain;
        info!(
            item = %item_id,
            category = %descriptor.category(),
            warm = category_rate.is_some(),
            "materialized model"
        );
        Ok(entry)
    }

    /// Category warm-start parameters and prior rate, or defaults.
    fn warm_model(&self, descriptor: &ItemDescriptor) -> (StateSpaceModel, Option<f64>) {
        let owner = CheckpointOwner::Category(descriptor.category().clone());
        match self.models.load(&owner) {
            Ok(Some(checkpoint)) => {
                let rate = checkpoint.last_state.rate();
                (
                    StateSpaceModel::new(checkpoint.parameters.clone()),
                    Some(rate),
                )
            }
            Ok(None) => (StateSpaceModel::new(ModelParameters::defaults()), None),
            Err(e) => {
                // A broken category prior must not block the item; fall
                // back to defaults.
                warn!(category = %descriptor.category(), error = %e, "category warm start unavailable");
                (StateSpaceModel::new(ModelParameters::defaults()), None)
            }
        }
    }

    /// Recent `(day, quantity)` pairs for slope initialization.
    fn recent_history(&self, item_id: &ItemId) -> Result<Vec<(f64, f64)>, TrainError> {
        let history = with_retry("recent history", || {
            self.observations
                .range(item_id, DateTime::<Utc>::MIN_UTC, Utc::now())
        })?;
        let recent: Vec<&Observation> = history.iter().rev().take(20).collect();
        let Some(first_ts) = recent.last().map(|o| o.timestamp()) else {
            return Ok(Vec::new());
        };
        Ok(recent
            .iter()
            .rev()
            .map(|o| {
                let days = (o.timestamp() - first_ts).num_seconds() as f64 / 86_400.0;
                (days, o.quantity())
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Folding
    // ------------------------------------------------------------------

    /// Folds one in-order observation into an entry: restock detection,
    /// Kalman filter, gradient step, stats.
    fn fold(
        &self,
        entry: &mut ItemEntry,
        y_obs: f64,
        ts: DateTime<Utc>,
        descriptor: &ItemDescriptor,
    ) -> Result<(f64, f64, bool), larder_ssm::SsmError> {
        let prev_q = entry.prev_quantity.unwrap_or_else(|| entry.state.quantity());
        let restock = y_obs > prev_q + self.config.restock_buffer();

        let (prediction, innovation) = if restock {
            debug!(from = prev_q, to = y_obs, "restock detected, resetting state");
            entry.state = entry.state.restocked(y_obs);
            (0.0, 0.0)
        } else {
            let features = self.features.build(ts, descriptor);
            let (predicted, y_hat) = entry.model.predict(&entry.state, &features);
            let step = entry
                .model
                .update(predicted, y_obs, descriptor.quantity_max())?;
            entry.model.params_mut().apply_gradient_step(
                &features,
                step.innovation,
                self.config.learning_rate(),
                self.config.ewma_alpha(),
            );
            entry
                .stats
                .update(step.innovation, self.config.ewma_alpha(), ts);
            entry.state = step.state;
            (y_hat, step.innovation)
        };

        entry.prev_quantity = Some(y_obs);
        entry.last_obs_ts = Some(entry.last_obs_ts.map_or(ts, |last| last.max(ts)));
        entry.trained_at = ts;
        entry.dirty = true;
        Ok((prediction, innovation, restock))
    }

    /// Rebuilds the entry from warm start and re-folds the item's whole
    /// stored history in timestamp order. Used for out-of-order
    /// backfill: the retained checkpoint is newer than the incoming
    /// observation, so the suffix to re-filter is the entire history.
    fn refilter(
        &self,
        item_id: &ItemId,
        descriptor: &ItemDescriptor,
        entry: &mut ItemEntry,
    ) -> Result<(), TrainError> {
        let history = self.full_history(item_id)?;
        let (model, category_rate) = self.warm_model(descriptor);
        let current = descriptor
            .quantity_current()
            .unwrap_or(descriptor.quantity_max());
        let state = model.initialize(current, &[], category_rate, descriptor.quantity_max());

        entry.model = model;
        entry.state = state;
        entry.stats = TrainingStats::new();
        entry.prev_quantity = None;
        entry.last_obs_ts = None;

        for observation in &history {
            self.fold(
                entry,
                observation.quantity(),
                observation.timestamp(),
                descriptor,
            )
            .map_err(|source| TrainError::NumericalFault {
                item_id: item_id.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// The item's entire stored history, oldest first.
    fn full_history(&self, item_id: &ItemId) -> Result<Vec<Observation>, TrainError> {
        Ok(with_retry("full history", || {
            self.observations
                .range(item_id, DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC)
        })?)
    }

    // ------------------------------------------------------------------
    // Retrain internals
    // ------------------------------------------------------------------

    fn retrain_locked(
        &self,
        item_id: &ItemId,
        descriptor: &ItemDescriptor,
        entry: &mut ItemEntry,
        now: DateTime<Utc>,
        cancel: &CancelToken,
        deadline: Instant,
    ) -> Result<RetrainOutcome, TrainError> {
        cancel.check()?;
        let history = self.full_history(item_id)?;
        if history.len() < MIN_RETRAIN_OBSERVATIONS {
            debug!(item = %item_id, n = history.len(), "too little history, skipping retrain");
            return Ok(RetrainOutcome::Skipped {
                reason: format!(
                    "{} observations, need {MIN_RETRAIN_OBSERVATIONS}",
                    history.len()
                ),
            });
        }

        // Candidate rebuilt from warm start; the live entry is only
        // touched after every pass succeeded.
        let (model, category_rate) = self.warm_model(descriptor);
        let current = descriptor
            .quantity_current()
            .unwrap_or(descriptor.quantity_max());
        let initial = model.initialize(current, &[], category_rate, descriptor.quantity_max());
        let mut candidate = ItemEntry::new(model, initial, now);

        let mut prev_mse: Option<f64> = None;
        let mut final_mse = 0.0;
        let mut passes_run = 0;
        for _pass in 0..self.config.max_retrain_passes() {
            // Each pass starts from the initial state; parameters keep
            // learning across passes.
            candidate.state = candidate.model.initialize(
                current,
                &[],
                category_rate,
                descriptor.quantity_max(),
            );
            candidate.stats = TrainingStats::new();
            candidate.prev_quantity = None;
            candidate.last_obs_ts = None;

            let mut sum_sq = 0.0;
            let mut consumption_steps = 0usize;
            for (i, observation) in history.iter().enumerate() {
                if i % CANCEL_STRIDE == 0 {
                    cancel.check()?;
                    if Instant::now() > deadline {
                        return Err(TrainError::Timeout {
                            operation: "retrain",
                            seconds: self.config.retrain_timeout().as_secs(),
                        });
                    }
                }
                let (_, innovation, restock) = self
                    .fold(
                        &mut candidate,
                        observation.quantity(),
                        observation.timestamp(),
                        descriptor,
                    )
                    .map_err(|e| TrainError::RetrainFailed {
                        item_id: item_id.clone(),
                        reason: e.to_string(),
                    })?;
                if !restock {
                    sum_sq += innovation * innovation;
                    consumption_steps += 1;
                }
            }

            passes_run += 1;
            final_mse = if consumption_steps > 0 {
                sum_sq / consumption_steps as f64
            } else {
                0.0
            };
            if let Some(prev) = prev_mse
                && prev > 0.0
                && ((prev - final_mse).abs() / prev) < self.config.retrain_mse_tol()
            {
                break;
            }
            prev_mse = Some(final_mse);
        }

        // Swap the candidate in, keeping identity and version counter.
        entry.model = candidate.model;
        entry.state = candidate.state;
        entry.stats = candidate.stats;
        entry.prev_quantity = candidate.prev_quantity;
        entry.last_obs_ts = candidate.last_obs_ts;
        entry.trained_at = now;
        entry.dirty = true;

        info!(
            item = %item_id,
            passes = passes_run,
            mse = final_mse,
            n = history.len(),
            "retrain complete"
        );
        Ok(RetrainOutcome::Completed {
            passes: passes_run,
            mse: final_mse,
            observations: history.len(),
        })
    }

    // ------------------------------------------------------------------
    // Persistence and fault handling
    // ------------------------------------------------------------------

    /// Persists the entry if the rate limit allows it.
    fn maybe_persist(&self, item_id: &ItemId, entry: &mut ItemEntry) {
        let due = entry
            .last_persist
            .is_none_or(|at| at.elapsed() >= self.config.min_persist_interval());
        if entry.dirty && due {
            self.persist(item_id, entry);
        }
    }

    /// Writes the next checkpoint version. Store failures keep the
    /// entry dirty; the write is retried on the next observation.
    fn persist(&self, item_id: &ItemId, entry: &mut ItemEntry) {
        let checkpoint = entry.to_checkpoint(item_id, &FEATURE_NAMES);
        let owner = CheckpointOwner::Item(item_id.clone());
        match with_retry("checkpoint store", || {
            self.models.store(&owner, &checkpoint)
        }) {
            Ok(()) => {
                entry.version = checkpoint.version;
                entry.dirty = false;
                entry.last_persist = Some(Instant::now());
            }
            Err(e) => {
                warn!(item = %item_id, error = %e, "checkpoint write failed, keeping in-memory state");
            }
        }
    }

    /// Rewinds an entry to its last persisted checkpoint after a
    /// numerical fault and flags an immediate retrain.
    fn rewind(&self, item_id: &ItemId, descriptor: &ItemDescriptor, entry: &mut ItemEntry) {
        let owner = CheckpointOwner::Item(item_id.clone());
        let rewound = match self.models.load(&owner) {
            Ok(Some(checkpoint)) => ItemEntry::from_checkpoint(&checkpoint),
            _ => match self.warm_entry(item_id, descriptor, true) {
                Ok(entry) => entry,
                Err(_) => return,
            },
        };
        let version = entry.version.max(rewound.version);
        *entry = rewound;
        entry.version = version;
        entry.force_retrain = true;
        warn!(item = %item_id, "entry rewound after numerical fault, retrain forced");
    }

    fn log_audit(&self, event: AuditEvent) {
        if let Err(e) = self.audit.log(event) {
            warn!(error = %e, "audit sink rejected event");
        }
    }
}

impl std::fmt::Debug for OnlineTrainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnlineTrainer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
