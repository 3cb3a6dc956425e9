//! The checkpoint record.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use larder_models::{CategoryKey, ItemId, TrainingStats};
use larder_ssm::{ModelParameters, ModelState};

/// Who a checkpoint belongs to: a single item, or a category prior used
/// for warm starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CheckpointOwner {
    /// Per-item checkpoint (`items/{item_id}.ckpt`).
    Item(ItemId),
    /// Category warm-start checkpoint (`pretrained/{category}.ckpt`).
    Category(CategoryKey),
}

impl CheckpointOwner {
    /// Stable wire tag.
    pub(crate) fn tag(&self) -> u8 {
        match self {
            Self::Item(_) => 0,
            Self::Category(_) => 1,
        }
    }

    /// The owner key as a string.
    pub fn key(&self) -> &str {
        match self {
            Self::Item(id) => id.as_str(),
            Self::Category(key) => key.as_str(),
        }
    }
}

/// A persisted, versioned snapshot of one model: parameters, last
/// posterior state, and training statistics, sufficient to resume
/// filtering exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCheckpoint {
    /// Stable id of the model instance.
    pub model_id: Uuid,
    /// Item or category the checkpoint belongs to.
    pub owner: CheckpointOwner,
    /// Monotonically increasing per-owner version.
    pub version: u64,
    /// Model parameters at snapshot time.
    pub parameters: ModelParameters,
    /// Last posterior state.
    pub last_state: ModelState,
    /// When the model was created.
    pub created_at: DateTime<Utc>,
    /// When the model was last trained (online step or full retrain).
    pub trained_at: DateTime<Utc>,
    /// Names of the features the model was trained with.
    pub feature_names: Vec<String>,
    /// Rolling training statistics.
    pub stats: TrainingStats,
}

impl ModelCheckpoint {
    /// Returns a copy with the version bumped and `trained_at` updated,
    /// carrying new state and stats.
    pub fn next_version(
        &self,
        last_state: ModelState,
        parameters: ModelParameters,
        stats: TrainingStats,
        trained_at: DateTime<Utc>,
    ) -> Self {
        Self {
            model_id: self.model_id,
            owner: self.owner.clone(),
            version: self.version + 1,
            parameters,
            last_state,
            created_at: self.created_at,
            trained_at,
            feature_names: self.feature_names.clone(),
            stats,
        }
    }
}
