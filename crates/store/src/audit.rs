//! Audit event records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use larder_models::ItemId;

/// What kind of event happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// An ingested observation was rejected.
    ObservationRejected,
    /// A forecast record was produced.
    ForecastGenerated,
    /// A full retrain completed.
    ModelRetrained,
    /// A corrupt checkpoint file was quarantined.
    CheckpointQuarantined,
    /// A full retrain failed.
    RetrainFailed,
}

/// Whether the audited operation succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// The operation completed.
    Success,
    /// The operation failed.
    Failure,
}

/// One structured audit record. `details` carries a summary only, never
/// raw model state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
    /// Event kind.
    pub action: AuditAction,
    /// Item involved, if the event is item-scoped.
    pub item_id: Option<ItemId>,
    /// Success or failure.
    pub outcome: AuditOutcome,
    /// Free-form JSON summary.
    pub details: serde_json::Value,
}

impl AuditEvent {
    /// Creates an event stamped `now`.
    pub fn new(
        action: AuditAction,
        item_id: Option<ItemId>,
        outcome: AuditOutcome,
        details: serde_json::Value,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            item_id,
            outcome,
            details,
        }
    }
}
