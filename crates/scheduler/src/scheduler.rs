//! The clock-driven retraining loop.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Timelike, Utc};
use rayon::prelude::*;
use serde_json::json;
use tracing::{debug, info, warn};

use larder_models::ItemId;
use larder_store::{AuditAction, AuditEvent, AuditOutcome, AuditSink, ObservationStore};
use larder_trainer::{CancelToken, DescriptorProvider, OnlineTrainer, RetrainOutcome};

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickSummary {
    /// Items examined.
    pub examined: usize,
    /// Items that satisfied `needs_retrain` and were dispatched.
    pub scheduled: usize,
    /// Retrains that completed.
    pub completed: usize,
    /// Retrains skipped (e.g. too little history).
    pub skipped: usize,
    /// Retrains that failed.
    pub failed: usize,
}

/// Periodic driver that re-fits stale models without blocking online
/// inference. Holds no per-item state of its own; all contention is on
/// the trainer's per-item locks.
pub struct TrainingScheduler {
    config: SchedulerConfig,
    trainer: Arc<OnlineTrainer>,
    observations: Arc<dyn ObservationStore>,
    descriptors: Arc<dyn DescriptorProvider>,
    audit: Arc<dyn AuditSink>,
}

impl TrainingScheduler {
    /// Creates a scheduler over the trainer and stores.
    pub fn new(
        config: SchedulerConfig,
        trainer: Arc<OnlineTrainer>,
        observations: Arc<dyn ObservationStore>,
        descriptors: Arc<dyn DescriptorProvider>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            config,
            trainer,
            observations,
            descriptors,
            audit,
        }
    }

    /// Returns the scheduler configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Runs one scheduling pass at `now`: enumerate, filter, dispatch.
    ///
    /// Each due item is retrained exactly once per tick, with at most
    /// `max_parallel` retrains in flight.
    #[tracing::instrument(skip(self, cancel), fields(now = %now))]
    pub fn tick(&self, now: DateTime<Utc>, cancel: &CancelToken) -> Result<TickSummary, SchedulerError> {
        if cancel.is_cancelled() {
            return Err(SchedulerError::Cancelled);
        }

        // BTreeSet dedupes: no item retrains twice within one tick.
        let items: BTreeSet<ItemId> = self.observations.items()?.into_iter().collect();
        let mut summary = TickSummary {
            examined: items.len(),
            ..TickSummary::default()
        };

        let mut due = Vec::new();
        for item_id in items {
            if cancel.is_cancelled() {
                return Err(SchedulerError::Cancelled);
            }
            let Some(descriptor) = self.descriptors.descriptor(&item_id) else {
                debug!(item = %item_id, "no descriptor, skipping");
                continue;
            };
            match self.trainer.needs_retrain(&item_id, &descriptor, now) {
                Ok(true) => due.push((item_id, descriptor)),
                Ok(false) => {}
                Err(e) => {
                    warn!(item = %item_id, error = %e, "retrain check failed");
                }
            }
        }
        summary.scheduled = due.len();
        if due.is_empty() {
            return Ok(summary);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_parallel())
            .build()
            .map_err(|e| SchedulerError::Pool {
                reason: e.to_string(),
            })?;

        let outcomes: Vec<(ItemId, Result<RetrainOutcome, String>)> = pool.install(|| {
            due.par_iter()
                .map(|(item_id, descriptor)| {
                    if cancel.is_cancelled() {
                        return (item_id.clone(), Err("cancelled".to_string()));
                    }
                    match self.trainer.retrain(item_id, descriptor, now, cancel) {
                        Ok(outcome) => (item_id.clone(), Ok(outcome)),
                        Err(e) => (item_id.clone(), Err(e.to_string())),
                    }
                })
                .collect()
        });

        for (item_id, outcome) in outcomes {
            match outcome {
                Ok(RetrainOutcome::Completed {
                    passes,
                    mse,
                    observations,
                }) => {
                    summary.completed += 1;
                    self.log_audit(AuditEvent::new(
                        AuditAction::ModelRetrained,
                        Some(item_id),
                        AuditOutcome::Success,
                        json!({ "passes": passes, "mse": mse, "observations": observations }),
                    ));
                }
                Ok(RetrainOutcome::Skipped { reason }) => {
                    summary.skipped += 1;
                    self.log_audit(AuditEvent::new(
                        AuditAction::ModelRetrained,
                        Some(item_id),
                        AuditOutcome::Success,
                        json!({ "skipped": true, "reason": reason }),
                    ));
                }
                Err(reason) => {
                    summary.failed += 1;
                    self.log_audit(AuditEvent::new(
                        AuditAction::RetrainFailed,
                        Some(item_id),
                        AuditOutcome::Failure,
                        json!({ "reason": reason }),
                    ));
                }
            }
        }

        info!(
            examined = summary.examined,
            scheduled = summary.scheduled,
            completed = summary.completed,
            skipped = summary.skipped,
            failed = summary.failed,
            "scheduler tick complete"
        );
        Ok(summary)
    }

    /// Blocking clock loop. Sleeps one tick interval at a time and runs
    /// a full sweep in the minute matching `daily_time`; returns when
    /// cancelled.
    pub fn run(&self, cancel: &CancelToken) {
        info!(daily_time = %self.config.daily_time(), "training scheduler started");
        while !cancel.is_cancelled() {
            let now = Utc::now();
            let target = self.config.daily_time();
            if now.time().hour() == target.hour() && now.time().minute() == target.minute() {
                if let Err(e) = self.tick(now, cancel) {
                    warn!(error = %e, "scheduler tick failed");
                }
            }
            thread::sleep(self.config.tick_interval());
        }
        info!("training scheduler stopped");
    }

    fn log_audit(&self, event: AuditEvent) {
        if let Err(e) = self.audit.log(event) {
            warn!(error = %e, "audit sink rejected event");
        }
    }
}

impl std::fmt::Debug for TrainingScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingScheduler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
