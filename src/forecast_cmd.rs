use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use larder_forecast::ForecastService;
use larder_models::{CategoryKey, ItemDescriptor, ItemId, ObservationSource};
use larder_store::{FsModelStore, MemoryAuditSink, MemoryForecastStore, MemoryObservationStore};
use larder_trainer::OnlineTrainer;

use crate::cli::ForecastArgs;
use crate::config::LarderConfig;
use crate::convert;
use crate::pretrain_cmd::load_config;

/// Run the `forecast` subcommand: ingest the optional CSV history and
/// print the forecast for one item.
pub fn run(config_path: &Path, args: ForecastArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let service = build_service(&config)?;

    let item_id = ItemId::new(args.item.clone());
    let mut descriptor = ItemDescriptor::new(
        CategoryKey::new(args.category.clone()),
        args.perishable,
        args.household,
        args.quantity_min,
        args.quantity_max,
    )
    .context("invalid item descriptor")?;

    if let Some(ref history_path) = args.history {
        let history = read_history(history_path)?;
        info!(n = history.len(), "ingesting history");
        let mut last_quantity = None;
        for (ts, quantity) in history {
            service
                .ingest(&item_id, quantity, ts, &descriptor, ObservationSource::Manual)
                .with_context(|| format!("failed to ingest observation at {ts}"))?;
            last_quantity = Some(quantity);
        }
        if let Some(quantity) = last_quantity {
            descriptor = descriptor.with_current_quantity(quantity);
        }
    }

    let forecast = service
        .forecast(&item_id, args.horizon, &descriptor)
        .context("forecast failed")?;

    println!("item: {}", forecast.item_id);
    println!("horizon_days: {}", forecast.horizon_days);
    println!("confidence: {:.3}", forecast.confidence);
    match forecast.predicted_runout_date {
        Some(date) => println!("predicted_runout_date: {date}"),
        None => println!("predicted_runout_date: none within horizon"),
    }
    if let Some(date) = forecast.recommended_order_date {
        println!("recommended_order_date: {date}");
    }
    println!("recommended_quantity: {:.2}", forecast.recommended_quantity);
    println!("trajectory:");
    for (day, ((q, lo), hi)) in forecast
        .trajectory
        .iter()
        .zip(&forecast.lower)
        .zip(&forecast.upper)
        .enumerate()
    {
        println!("  day {:>2}: {q:.2} [{lo:.2}, {hi:.2}]", day + 1);
    }
    Ok(())
}

fn build_service(config: &LarderConfig) -> Result<ForecastService> {
    let models = Arc::new(
        FsModelStore::open(&config.data_dir)
            .with_context(|| format!("failed to open model store in {}", config.data_dir.display()))?,
    );
    let observations = Arc::new(MemoryObservationStore::new());
    let forecasts = Arc::new(MemoryForecastStore::new());
    let audit = Arc::new(MemoryAuditSink::new());

    let trainer_config = convert::build_trainer_config(&config.trainer)?;
    let trainer = Arc::new(OnlineTrainer::new(
        trainer_config,
        observations.clone(),
        models,
        audit.clone(),
    ));
    Ok(ForecastService::new(
        convert::build_forecast_config(&config.forecast),
        trainer,
        observations,
        forecasts,
        audit,
    ))
}

/// Parses a `timestamp,quantity` CSV file (RFC 3339 timestamps, `#`
/// comments and blank lines skipped).
fn read_history(path: &Path) -> Result<Vec<(DateTime<Utc>, f64)>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read history file: {}", path.display()))?;
    let mut out = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((ts_text, quantity_text)) = line.split_once(',') else {
            bail!("line {}: expected 'timestamp,quantity'", lineno + 1);
        };
        let ts: DateTime<Utc> = ts_text
            .trim()
            .parse()
            .with_context(|| format!("line {}: bad timestamp '{ts_text}'", lineno + 1))?;
        let quantity: f64 = quantity_text
            .trim()
            .parse()
            .with_context(|| format!("line {}: bad quantity '{quantity_text}'", lineno + 1))?;
        out.push((ts, quantity));
    }
    if out.is_empty() {
        bail!("history file {} contains no observations", path.display());
    }
    Ok(out)
}
