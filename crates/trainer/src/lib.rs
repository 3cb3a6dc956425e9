//! # larder-trainer
//!
//! Per-item online training for the consumption models.
//!
//! The [`OnlineTrainer`] owns a bounded registry of per-item model
//! entries, each guarded by its own mutex. An incoming observation is
//! validated, Kalman-filtered into the item's state, folded into the
//! gradient/EWMA parameter step, and periodically persisted as a
//! versioned checkpoint. Models materialize lazily through the
//! warm-start chain: per-item checkpoint, then category checkpoint,
//! then built-in defaults.
//!
//! Full retrains rebuild an entry from warm start over the item's whole
//! stored history; they hold only that item's lock, so ingestion for
//! other items is never blocked.

mod cancel;
mod config;
mod entry;
mod error;
mod registry;
mod trainer;

pub use cancel::CancelToken;
pub use config::TrainerConfig;
pub use entry::{EntrySnapshot, ItemEntry};
pub use error::TrainError;
pub use trainer::{DescriptorProvider, ObservationUpdate, OnlineTrainer, RetrainOutcome};
