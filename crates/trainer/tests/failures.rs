use std::fs;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};

use larder_models::{CategoryKey, ItemDescriptor, ItemId, ObservationSource};
use larder_store::{
    AuditAction, FsModelStore, MemoryAuditSink, MemoryObservationStore,
};
use larder_trainer::{OnlineTrainer, TrainerConfig};

fn descriptor() -> ItemDescriptor {
    ItemDescriptor::new(CategoryKey::from("Dairy"), true, 4, 0.5, 4.0).unwrap()
}

fn day(k: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::days(k)
}

#[test]
fn corrupt_checkpoint_is_quarantined_and_ingest_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let models = Arc::new(FsModelStore::open(dir.path()).unwrap());
    let audit = Arc::new(MemoryAuditSink::new());
    let trainer = OnlineTrainer::new(
        TrainerConfig::default().with_min_persist_interval(StdDuration::ZERO),
        Arc::new(MemoryObservationStore::new()),
        models.clone(),
        audit.clone(),
    );

    // Random bytes where the checkpoint should be.
    let item = ItemId::from("x");
    let bad_path = dir.path().join("items/x.ckpt");
    fs::write(&bad_path, b"\x13\x37 definitely not an envelope \xff\xfe").unwrap();

    let update = trainer
        .on_observation(&item, 2.0, day(0), &descriptor(), ObservationSource::Sensor)
        .unwrap();
    assert!(!update.restock);

    // The corrupt file moved aside and a fresh checkpoint took its place.
    assert!(dir.path().join("items/x.ckpt.bad").exists());
    assert!(bad_path.exists(), "fresh checkpoint written after quarantine");

    let events = audit.events();
    assert!(
        events
            .iter()
            .any(|e| e.action == AuditAction::CheckpointQuarantined),
        "expected a quarantine audit event"
    );

    // Cold start: no prior dynamics survived the corruption.
    let snapshot = trainer.snapshot(&item, &descriptor()).unwrap();
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.stats.observations_seen, 1);
}

#[test]
fn corrupt_checkpoint_forces_a_retrain() {
    let dir = tempfile::tempdir().unwrap();
    let models = Arc::new(FsModelStore::open(dir.path()).unwrap());
    let trainer = OnlineTrainer::new(
        TrainerConfig::default().with_min_persist_interval(StdDuration::ZERO),
        Arc::new(MemoryObservationStore::new()),
        models,
        Arc::new(MemoryAuditSink::new()),
    );

    let item = ItemId::from("x");
    fs::write(dir.path().join("items/x.ckpt"), b"garbage").unwrap();
    trainer
        .on_observation(&item, 2.0, day(0), &descriptor(), ObservationSource::Sensor)
        .unwrap();

    // The quarantined item is flagged regardless of the retrain clock.
    assert!(trainer.needs_retrain(&item, &descriptor(), day(0)).unwrap());
}
