//! Collaborator capability sets.
//!
//! The core consumes these four traits and assumes nothing else about
//! the host's storage. All implementations must be safe for concurrent
//! use by many readers and a bounded number of writers.

use larder_checkpoint::{CheckpointOwner, ModelCheckpoint};
use larder_models::{Forecast, ItemId, Observation};

use crate::audit::AuditEvent;
use crate::error::StoreError;

use chrono::{DateTime, NaiveDate, Utc};

/// Durable, append-only observation log.
///
/// Readers must see all appends committed before the read call.
pub trait ObservationStore: Send + Sync {
    /// Appends one observation.
    fn append(&self, observation: Observation) -> Result<(), StoreError>;

    /// Returns observations for `item_id` with
    /// `from <= timestamp <= to`, oldest first. Records sharing a
    /// timestamp keep append order, so the later append wins when
    /// folded.
    fn range(
        &self,
        item_id: &ItemId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Observation>, StoreError>;

    /// Returns the most recent observation for `item_id`, if any.
    fn last(&self, item_id: &ItemId) -> Result<Option<Observation>, StoreError>;

    /// Returns all item ids with at least one observation.
    fn items(&self) -> Result<Vec<ItemId>, StoreError>;
}

/// Checkpoint persistence with atomic publication.
pub trait ModelStore: Send + Sync {
    /// Loads the checkpoint for `owner`, or `None` if absent.
    ///
    /// A present-but-undecodable checkpoint is a
    /// [`StoreError::Corrupt`]; callers quarantine and fall back.
    fn load(&self, owner: &CheckpointOwner) -> Result<Option<ModelCheckpoint>, StoreError>;

    /// Atomically publishes a checkpoint: a reader never observes a
    /// partial write, and a crash never replaces a valid file with a
    /// broken one.
    fn store(&self, owner: &CheckpointOwner, checkpoint: &ModelCheckpoint)
        -> Result<(), StoreError>;

    /// Lists the categories with a warm-start checkpoint.
    fn list_categories(&self) -> Result<Vec<String>, StoreError>;

    /// Moves a checkpoint aside (`.bad` suffix) so the next load falls
    /// back to warm start.
    fn quarantine(&self, owner: &CheckpointOwner, reason: &str) -> Result<(), StoreError>;
}

/// Latest forecast per `(item, horizon)`.
pub trait ForecastStore: Send + Sync {
    /// Inserts or replaces the forecast for its `(item, horizon)` key.
    fn upsert(&self, forecast: &Forecast) -> Result<(), StoreError>;

    /// Returns the most recently created forecast for `item_id` across
    /// all horizons, if any.
    fn get_latest(&self, item_id: &ItemId) -> Result<Option<Forecast>, StoreError>;

    /// Records the actual runout date on every stored forecast for
    /// `item_id`, for accuracy measurement.
    fn set_actual(&self, item_id: &ItemId, date: NaiveDate) -> Result<(), StoreError>;
}

/// Structured audit log.
pub trait AuditSink: Send + Sync {
    /// Appends one audit event. Audit failures are reported but must
    /// never abort the audited operation; callers log and continue.
    fn log(&self, event: AuditEvent) -> Result<(), StoreError>;
}
