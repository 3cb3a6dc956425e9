//! Per-item registry entries.

use std::time::Instant;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use larder_checkpoint::{CheckpointOwner, ModelCheckpoint};
use larder_models::{ItemId, TrainingStats};
use larder_ssm::{ModelState, StateSpaceModel};

/// Mutable per-item model state held by the trainer registry.
///
/// One entry per item, guarded by its own mutex; the trainer enforces
/// one writer per item. Typically under 4 KiB.
#[derive(Debug, Clone)]
pub struct ItemEntry {
    /// Stable id of the model instance.
    pub model_id: Uuid,
    /// The model (parameters) for this item.
    pub model: StateSpaceModel,
    /// Last posterior state.
    pub state: ModelState,
    /// Rolling error statistics.
    pub stats: TrainingStats,
    /// Version of the last persisted checkpoint (0 if never persisted).
    pub version: u64,
    /// When the model was created.
    pub created_at: DateTime<Utc>,
    /// When the entry was last trained (online or full).
    pub trained_at: DateTime<Utc>,
    /// When the last full retrain completed.
    pub last_full_retrain_at: DateTime<Utc>,
    /// Timestamp of the newest observation folded so far.
    pub last_obs_ts: Option<DateTime<Utc>>,
    /// Last observed quantity, for restock detection.
    pub prev_quantity: Option<f64>,
    /// Wall-clock time of the last checkpoint write.
    pub last_persist: Option<Instant>,
    /// True if in-memory state is newer than the persisted checkpoint.
    pub dirty: bool,
    /// True once a numerical fault or corruption demands an immediate
    /// full retrain.
    pub force_retrain: bool,
    /// Consecutive full-retrain failures.
    pub retrain_failures: u32,
    /// True while retrains are paused after repeated failures.
    pub retrain_paused: bool,
}

impl ItemEntry {
    /// Builds a fresh entry around a model and state.
    pub fn new(model: StateSpaceModel, state: ModelState, now: DateTime<Utc>) -> Self {
        Self {
            model_id: Uuid::new_v4(),
            model,
            state,
            stats: TrainingStats::new(),
            version: 0,
            created_at: now,
            trained_at: now,
            last_full_retrain_at: now,
            last_obs_ts: None,
            prev_quantity: None,
            last_persist: None,
            dirty: false,
            force_retrain: false,
            retrain_failures: 0,
            retrain_paused: false,
        }
    }

    /// Rebuilds an entry from a persisted per-item checkpoint.
    pub fn from_checkpoint(checkpoint: &ModelCheckpoint) -> Self {
        Self {
            model_id: checkpoint.model_id,
            model: StateSpaceModel::new(checkpoint.parameters.clone()),
            state: checkpoint.last_state.clone(),
            stats: checkpoint.stats,
            version: checkpoint.version,
            created_at: checkpoint.created_at,
            trained_at: checkpoint.trained_at,
            last_full_retrain_at: checkpoint.trained_at,
            last_obs_ts: checkpoint.stats.last_update_at,
            prev_quantity: Some(checkpoint.last_state.quantity()),
            last_persist: None,
            dirty: false,
            force_retrain: false,
            retrain_failures: 0,
            retrain_paused: false,
        }
    }

    /// Builds the next checkpoint for this entry, bumping the version.
    pub fn to_checkpoint(&self, item_id: &ItemId, feature_names: &[&str]) -> ModelCheckpoint {
        ModelCheckpoint {
            model_id: self.model_id,
            owner: CheckpointOwner::Item(item_id.clone()),
            version: self.version + 1,
            parameters: self.model.params().clone(),
            last_state: self.state.clone(),
            created_at: self.created_at,
            trained_at: self.trained_at,
            feature_names: feature_names.iter().map(|s| s.to_string()).collect(),
            stats: self.stats,
        }
    }

    /// Read-only snapshot for forecasting.
    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            model_id: self.model_id,
            model: self.model.clone(),
            state: self.state.clone(),
            stats: self.stats,
            version: self.version,
        }
    }
}

/// Immutable copy of an entry, taken under the per-item lock and used
/// outside it for simulation.
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    /// Stable id of the model instance.
    pub model_id: Uuid,
    /// The model (parameters).
    pub model: StateSpaceModel,
    /// Posterior state at snapshot time.
    pub state: ModelState,
    /// Rolling error statistics at snapshot time.
    pub stats: TrainingStats,
    /// Persisted checkpoint version at snapshot time.
    pub version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_ssm::ModelParameters;

    fn entry() -> ItemEntry {
        let model = StateSpaceModel::new(ModelParameters::defaults());
        let state = model.initialize(4.0, &[], None, 4.0);
        ItemEntry::new(model, state, Utc::now())
    }

    #[test]
    fn new_entry_is_clean() {
        let entry = entry();
        assert_eq!(entry.version, 0);
        assert!(!entry.dirty);
        assert!(!entry.force_retrain);
        assert_eq!(entry.retrain_failures, 0);
        assert!(entry.last_obs_ts.is_none());
    }

    #[test]
    fn checkpoint_round_trip_preserves_model() {
        let mut original = entry();
        original.version = 4;
        let ckpt = original.to_checkpoint(&ItemId::from("milk"), &["dow", "weekend"]);
        assert_eq!(ckpt.version, 5);
        assert_eq!(ckpt.feature_names, vec!["dow", "weekend"]);

        let rebuilt = ItemEntry::from_checkpoint(&ckpt);
        assert_eq!(rebuilt.model_id, original.model_id);
        assert_eq!(rebuilt.version, 5);
        assert_eq!(rebuilt.state, original.state);
        assert_eq!(rebuilt.model.params(), original.model.params());
        assert!(!rebuilt.dirty);
    }

    #[test]
    fn from_checkpoint_seeds_restock_baseline() {
        let original = entry();
        let ckpt = original.to_checkpoint(&ItemId::from("milk"), &[]);
        let rebuilt = ItemEntry::from_checkpoint(&ckpt);
        assert_eq!(rebuilt.prev_quantity, Some(4.0));
    }

    #[test]
    fn snapshot_is_detached() {
        let mut entry = entry();
        let snapshot = entry.snapshot();
        entry.state = entry.state.restocked(1.0);
        assert_eq!(snapshot.state.quantity(), 4.0);
        assert_eq!(entry.state.quantity(), 1.0);
    }
}
