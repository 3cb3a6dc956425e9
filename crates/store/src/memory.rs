//! In-memory reference stores.
//!
//! Used by embedding hosts without durable storage and throughout the
//! test suite. All are internally synchronized and cheap to clone
//! behind an `Arc`.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};

use larder_checkpoint::{CheckpointOwner, ModelCheckpoint};
use larder_models::{Forecast, ItemId, Observation};

use crate::audit::AuditEvent;
use crate::error::StoreError;
use crate::traits::{AuditSink, ForecastStore, ModelStore, ObservationStore};

/// Append-only observation log held in memory.
#[derive(Debug, Default)]
pub struct MemoryObservationStore {
    log: RwLock<BTreeMap<ItemId, Vec<Observation>>>,
}

impl MemoryObservationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of observations stored for `item_id`.
    pub fn len(&self, item_id: &ItemId) -> usize {
        self.log.read().get(item_id).map_or(0, Vec::len)
    }
}

impl ObservationStore for MemoryObservationStore {
    fn append(&self, observation: Observation) -> Result<(), StoreError> {
        let mut log = self.log.write();
        let entries = log.entry(observation.item_id().clone()).or_default();
        // Keep the per-item log timestamp-sorted; equal timestamps keep
        // append order so the later record wins when folded.
        let at = entries.partition_point(|o| o.timestamp() <= observation.timestamp());
        entries.insert(at, observation);
        Ok(())
    }

    fn range(
        &self,
        item_id: &ItemId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Observation>, StoreError> {
        let log = self.log.read();
        Ok(log
            .get(item_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|o| o.timestamp() >= from && o.timestamp() <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn last(&self, item_id: &ItemId) -> Result<Option<Observation>, StoreError> {
        Ok(self.log.read().get(item_id).and_then(|e| e.last().cloned()))
    }

    fn items(&self) -> Result<Vec<ItemId>, StoreError> {
        Ok(self.log.read().keys().cloned().collect())
    }
}

/// Checkpoint store held in memory.
///
/// Supports fault injection for exercising retry and fallback paths.
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    checkpoints: RwLock<HashMap<CheckpointOwner, ModelCheckpoint>>,
    quarantined: Mutex<Vec<(CheckpointOwner, String)>>,
    fail_stores: Mutex<u32>,
}

impl MemoryModelStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` calls to `store` fail with
    /// [`StoreError::Unavailable`].
    pub fn fail_next_stores(&self, n: u32) {
        *self.fail_stores.lock() = n;
    }

    /// Quarantined keys with reasons, in call order.
    pub fn quarantined(&self) -> Vec<(CheckpointOwner, String)> {
        self.quarantined.lock().clone()
    }
}

impl ModelStore for MemoryModelStore {
    fn load(&self, owner: &CheckpointOwner) -> Result<Option<ModelCheckpoint>, StoreError> {
        Ok(self.checkpoints.read().get(owner).cloned())
    }

    fn store(
        &self,
        owner: &CheckpointOwner,
        checkpoint: &ModelCheckpoint,
    ) -> Result<(), StoreError> {
        {
            let mut fail = self.fail_stores.lock();
            if *fail > 0 {
                *fail -= 1;
                return Err(StoreError::Unavailable {
                    reason: "injected store failure".to_string(),
                });
            }
        }
        self.checkpoints
            .write()
            .insert(owner.clone(), checkpoint.clone());
        Ok(())
    }

    fn list_categories(&self) -> Result<Vec<String>, StoreError> {
        let mut categories: Vec<String> = self
            .checkpoints
            .read()
            .keys()
            .filter_map(|owner| match owner {
                CheckpointOwner::Category(key) => Some(key.as_str().to_string()),
                CheckpointOwner::Item(_) => None,
            })
            .collect();
        categories.sort();
        Ok(categories)
    }

    fn quarantine(&self, owner: &CheckpointOwner, reason: &str) -> Result<(), StoreError> {
        self.checkpoints.write().remove(owner);
        self.quarantined
            .lock()
            .push((owner.clone(), reason.to_string()));
        Ok(())
    }
}

/// Forecast store held in memory, keyed by `(item, horizon)`.
#[derive(Debug, Default)]
pub struct MemoryForecastStore {
    forecasts: RwLock<HashMap<(ItemId, u32), Forecast>>,
}

impl MemoryForecastStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the forecast for an exact `(item, horizon)` key.
    pub fn get(&self, item_id: &ItemId, horizon_days: u32) -> Option<Forecast> {
        self.forecasts
            .read()
            .get(&(item_id.clone(), horizon_days))
            .cloned()
    }

    /// All stored forecasts.
    pub fn all(&self) -> Vec<Forecast> {
        self.forecasts.read().values().cloned().collect()
    }
}

impl ForecastStore for MemoryForecastStore {
    fn upsert(&self, forecast: &Forecast) -> Result<(), StoreError> {
        self.forecasts.write().insert(
            (forecast.item_id.clone(), forecast.horizon_days),
            forecast.clone(),
        );
        Ok(())
    }

    fn get_latest(&self, item_id: &ItemId) -> Result<Option<Forecast>, StoreError> {
        Ok(self
            .forecasts
            .read()
            .values()
            .filter(|f| &f.item_id == item_id)
            .max_by_key(|f| f.created_at)
            .cloned())
    }

    fn set_actual(&self, item_id: &ItemId, date: NaiveDate) -> Result<(), StoreError> {
        let mut forecasts = self.forecasts.write();
        for forecast in forecasts.values_mut() {
            if &forecast.item_id == item_id {
                forecast.actual_runout_date = Some(date);
            }
        }
        Ok(())
    }
}

/// Audit sink that collects events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events logged so far, in order.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn log(&self, event: AuditEvent) -> Result<(), StoreError> {
        self.events.lock().push(event);
        Ok(())
    }
}
