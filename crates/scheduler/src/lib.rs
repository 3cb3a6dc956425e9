//! # larder-scheduler
//!
//! A single-writer, clock-driven loop that keeps per-item models fresh.
//!
//! On each tick the scheduler enumerates known items, asks the trainer
//! which are due for a full retrain, and dispatches up to
//! `max_parallel` retrains onto a bounded worker pool. Each worker
//! contends only on its item's lock in the trainer, so online ingestion
//! is never blocked globally. Outcomes are recorded to the audit sink.

mod config;
mod error;
mod scheduler;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use scheduler::{TickSummary, TrainingScheduler};
