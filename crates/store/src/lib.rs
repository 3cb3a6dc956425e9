//! # larder-store
//!
//! Storage collaborators consumed by the forecasting core, as trait
//! capability sets plus reference implementations:
//!
//! - [`ObservationStore`] — durable append-only observation log.
//! - [`ModelStore`] — checkpoint persistence with atomic publication
//!   and quarantine. [`FsModelStore`] is the filesystem implementation
//!   (`items/{item_id}.ckpt`, `pretrained/{category}.ckpt`).
//! - [`ForecastStore`] — latest forecast per `(item, horizon)`.
//! - [`AuditSink`] — structured audit events.
//!
//! In-memory implementations back embedding hosts and the test suite.
//! [`with_retry`] wraps flaky store calls with the standard exponential
//! backoff (50 ms, 200 ms, 1 s, give up).

mod audit;
mod error;
mod fs;
mod memory;
mod retry;
mod traits;

pub use audit::{AuditAction, AuditEvent, AuditOutcome};
pub use error::StoreError;
pub use fs::FsModelStore;
pub use memory::{MemoryAuditSink, MemoryForecastStore, MemoryModelStore, MemoryObservationStore};
pub use retry::with_retry;
pub use traits::{AuditSink, ForecastStore, ModelStore, ObservationStore};
