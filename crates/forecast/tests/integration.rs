use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};

use larder_forecast::{ForecastConfig, ForecastError, ForecastService};
use larder_models::{CategoryKey, ItemDescriptor, ItemId, ObservationSource};
use larder_store::{
    AuditAction, MemoryAuditSink, MemoryForecastStore, MemoryModelStore, MemoryObservationStore,
};
use larder_trainer::{CancelToken, OnlineTrainer, TrainError, TrainerConfig};

struct Harness {
    service: ForecastService,
    forecasts: Arc<MemoryForecastStore>,
    audit: Arc<MemoryAuditSink>,
}

fn harness() -> Harness {
    harness_with(ForecastConfig::default())
}

fn harness_with(config: ForecastConfig) -> Harness {
    let observations = Arc::new(MemoryObservationStore::new());
    let models = Arc::new(MemoryModelStore::new());
    let forecasts = Arc::new(MemoryForecastStore::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let trainer = Arc::new(OnlineTrainer::new(
        TrainerConfig::default().with_min_persist_interval(StdDuration::ZERO),
        observations.clone(),
        models,
        audit.clone(),
    ));
    Harness {
        service: ForecastService::new(config, trainer, observations, forecasts.clone(), audit.clone()),
        forecasts,
        audit,
    }
}

fn descriptor(min: f64, max: f64) -> ItemDescriptor {
    ItemDescriptor::new(CategoryKey::from("Dairy"), true, 4, min, max).unwrap()
}

/// Observation k days before now, anchored so the last one lands today.
fn days_ago(k: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(k)
}

#[test]
fn steady_consumption_scenario() {
    // quantity_max 4.0, quantity_min 0.5, 14 daily observations
    // decreasing 0.25/day from 4.0.
    let h = harness();
    let item = ItemId::from("milk");
    let descriptor = descriptor(0.5, 4.0);

    for k in 0..14 {
        let y = 4.0 - 0.25 * k as f64;
        h.service
            .ingest(&item, y, days_ago(13 - k), &descriptor, ObservationSource::Sensor)
            .unwrap();
    }

    let forecast = h.service.forecast(&item, 14, &descriptor).unwrap();

    let first_obs_date = days_ago(13).date_naive();
    let runout = forecast
        .predicted_runout_date
        .expect("a runout must be predicted");
    let days_from_start = (runout - first_obs_date).num_days();
    assert!(
        (13..=15).contains(&days_from_start),
        "runout {days_from_start} days from series start"
    );
    assert!(
        forecast.confidence >= 0.7,
        "confidence {}",
        forecast.confidence
    );
    assert_eq!(
        forecast.recommended_order_date,
        Some(runout - Duration::days(3))
    );
    assert!(
        (3.0..=4.0).contains(&forecast.recommended_quantity),
        "recommended {}",
        forecast.recommended_quantity
    );
}

#[test]
fn restock_spike_scenario() {
    // 10 days 4.0 -> 1.0, restock to 4.0, then 5 days 4.0 -> 3.0.
    let h = harness();
    let item = ItemId::from("milk");
    let descriptor = descriptor(0.5, 4.0);

    for k in 0..10 {
        let y = 4.0 - (3.0 / 9.0) * k as f64;
        h.service
            .ingest(&item, y, days_ago(15 - k), &descriptor, ObservationSource::Sensor)
            .unwrap();
    }
    h.service
        .ingest(&item, 4.0, days_ago(5), &descriptor, ObservationSource::Receipt)
        .unwrap();
    for k in 0..5 {
        let y = 4.0 - 0.25 * k as f64;
        h.service
            .ingest(&item, y, days_ago(4 - k), &descriptor, ObservationSource::Sensor)
            .unwrap();
    }

    let forecast = h.service.forecast(&item, 30, &descriptor).unwrap();
    let today = Utc::now().date_naive();
    let days_out = forecast
        .predicted_runout_date
        .map(|date| (date - today).num_days())
        .expect("a runout must be predicted within 30 days");
    assert!(days_out >= 10, "runout only {days_out} days out");
    assert!(
        forecast.confidence >= 0.5,
        "confidence {}",
        forecast.confidence
    );
}

#[test]
fn forecast_is_idempotent_without_new_observations() {
    let h = harness();
    let item = ItemId::from("milk");
    let descriptor = descriptor(0.5, 4.0);
    for k in 0..10 {
        h.service
            .ingest(
                &item,
                4.0 - 0.3 * k as f64,
                days_ago(9 - k),
                &descriptor,
                ObservationSource::Sensor,
            )
            .unwrap();
    }

    let first = h.service.forecast(&item, 14, &descriptor).unwrap();
    let second = h.service.forecast(&item, 14, &descriptor).unwrap();

    assert_eq!(first.trajectory, second.trajectory);
    assert_eq!(first.lower, second.lower);
    assert_eq!(first.upper, second.upper);
    assert_eq!(first.confidence, second.confidence);
    assert_eq!(first.model_version, second.model_version);
    // Still exactly one stored record for the (item, horizon) key.
    assert_eq!(h.forecasts.all().len(), 1);
}

#[test]
fn horizon_bounds_are_enforced() {
    let h = harness();
    let item = ItemId::from("milk");
    let descriptor = descriptor(0.5, 4.0);
    assert!(matches!(
        h.service.forecast(&item, 0, &descriptor),
        Err(ForecastError::HorizonExceeded { requested: 0, .. })
    ));
    assert!(matches!(
        h.service.forecast(&item, 91, &descriptor),
        Err(ForecastError::HorizonExceeded { requested: 91, .. })
    ));
    assert!(h.service.forecast(&item, 90, &descriptor).is_ok());
}

#[test]
fn rejected_ingest_is_audited() {
    let h = harness();
    let item = ItemId::from("milk");
    let descriptor = descriptor(0.5, 4.0);
    let err = h
        .service
        .ingest(&item, -2.0, days_ago(0), &descriptor, ObservationSource::Manual)
        .unwrap_err();
    assert!(matches!(
        err,
        ForecastError::Train(TrainError::InvalidObservation { .. })
    ));
    assert!(h
        .audit
        .events()
        .iter()
        .any(|e| e.action == AuditAction::ObservationRejected));
}

#[test]
fn forecast_generation_is_audited() {
    let h = harness();
    let item = ItemId::from("milk");
    let descriptor = descriptor(0.5, 4.0);
    h.service
        .ingest(&item, 3.0, days_ago(0), &descriptor, ObservationSource::Sensor)
        .unwrap();
    h.service.forecast(&item, 7, &descriptor).unwrap();
    let events = h.audit.events();
    let generated: Vec<_> = events
        .iter()
        .filter(|e| e.action == AuditAction::ForecastGenerated)
        .collect();
    assert_eq!(generated.len(), 1);
    assert_eq!(generated[0].details["horizon_days"], 7);
}

#[test]
fn batch_forecast_covers_all_items_in_order() {
    let h = harness();
    let items: Vec<(ItemId, ItemDescriptor)> = (0..8)
        .map(|i| {
            let item = ItemId::new(format!("item-{i}"));
            let descriptor = descriptor(0.5, 4.0);
            for k in 0..6 {
                h.service
                    .ingest(
                        &item,
                        4.0 - 0.2 * k as f64,
                        days_ago(5 - k),
                        &descriptor,
                        ObservationSource::Sensor,
                    )
                    .unwrap();
            }
            (item, descriptor)
        })
        .collect();

    let results = h
        .service
        .batch_forecast(&items, 14, &CancelToken::new());
    assert_eq!(results.len(), 8);
    for (i, result) in results.iter().enumerate() {
        let forecast = result.as_ref().unwrap();
        assert_eq!(forecast.item_id, items[i].0, "result order");
        assert_eq!(forecast.horizon_days, 14);
    }
    assert_eq!(h.forecasts.all().len(), 8);
}

#[test]
fn cancelled_batch_leaves_stores_consistent() {
    let h = harness();
    let items: Vec<(ItemId, ItemDescriptor)> = (0..6)
        .map(|i| (ItemId::new(format!("item-{i}")), descriptor(0.5, 4.0)))
        .collect();
    for (item, descriptor) in &items {
        h.service
            .ingest(item, 3.0, days_ago(0), descriptor, ObservationSource::Sensor)
            .unwrap();
    }

    let cancel = CancelToken::new();
    cancel.cancel();
    let results = h.service.batch_forecast(&items, 14, &cancel);
    assert!(results
        .iter()
        .all(|r| matches!(r, Err(ForecastError::Cancelled))));
    // Nothing was half-written.
    assert!(h.forecasts.all().is_empty());
}

#[test]
fn low_stock_filters_by_window_and_confidence() {
    let h = harness_with(ForecastConfig::default().with_low_stock_confidence(0.5));

    // "soon" runs out quickly; "plenty" does not run out within the
    // horizon at all.
    let soon = ItemId::from("soon");
    let plenty = ItemId::from("plenty");
    let descriptor_soon = descriptor(0.5, 4.0);
    let descriptor_plenty = descriptor(0.0, 40.0);

    for k in 0..10 {
        h.service
            .ingest(
                &soon,
                4.0 - 0.35 * k as f64,
                days_ago(9 - k),
                &descriptor_soon,
                ObservationSource::Sensor,
            )
            .unwrap();
        h.service
            .ingest(
                &plenty,
                40.0 - 0.05 * k as f64,
                days_ago(9 - k),
                &descriptor_plenty,
                ObservationSource::Sensor,
            )
            .unwrap();
    }
    h.service.forecast(&soon, 14, &descriptor_soon).unwrap();
    h.service.forecast(&plenty, 14, &descriptor_plenty).unwrap();

    let low = h.service.low_stock(7).unwrap();
    assert_eq!(low, vec![soon.clone()]);

    // A window of zero days excludes the near-future runout too.
    let none = h.service.low_stock(0).unwrap();
    assert!(none.is_empty());
}

#[test]
fn record_actual_runout_updates_stored_forecasts() {
    let h = harness();
    let item = ItemId::from("milk");
    let descriptor = descriptor(0.5, 4.0);
    for k in 0..8 {
        h.service
            .ingest(
                &item,
                4.0 - 0.3 * k as f64,
                days_ago(7 - k),
                &descriptor,
                ObservationSource::Sensor,
            )
            .unwrap();
    }
    h.service.forecast(&item, 14, &descriptor).unwrap();

    let actual = Utc::now().date_naive() + Duration::days(6);
    h.service.record_actual_runout(&item, actual).unwrap();
    let stored = h.forecasts.get(&item, 14).unwrap();
    assert_eq!(stored.actual_runout_date, Some(actual));
}

#[test]
fn record_actual_runout_for_unknown_item_fails() {
    let h = harness();
    let err = h
        .service
        .record_actual_runout(&ItemId::from("ghost"), Utc::now().date_naive())
        .unwrap_err();
    assert!(matches!(err, ForecastError::UnknownItem { .. }));
}

#[test]
fn model_performance_reflects_ingested_history() {
    let h = harness();
    let item = ItemId::from("milk");
    let descriptor = descriptor(0.5, 4.0);
    assert!(h.service.model_performance(&item).is_none());
    for k in 0..5 {
        h.service
            .ingest(
                &item,
                4.0 - 0.25 * k as f64,
                days_ago(4 - k),
                &descriptor,
                ObservationSource::Sensor,
            )
            .unwrap();
    }
    let stats = h.service.model_performance(&item).unwrap();
    assert_eq!(stats.observations_seen, 5);
}
