//! Mapping from TOML config to library configs.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::FixedOffset;

use larder_forecast::ForecastConfig;
use larder_pretrain::PretrainConfig;
use larder_trainer::TrainerConfig;

use crate::config::{ForecastToml, PretrainToml, TrainerToml};

pub fn build_trainer_config(toml: &TrainerToml) -> Result<TrainerConfig> {
    let timezone = FixedOffset::east_opt(toml.timezone_offset_sec)
        .with_context(|| format!("invalid timezone offset {} s", toml.timezone_offset_sec))?;
    Ok(TrainerConfig::default()
        .with_ewma_alpha(toml.ewma_alpha)
        .with_learning_rate(toml.learning_rate)
        .with_retrain_interval_days(toml.retrain_interval_days)
        .with_retrain_error_factor(toml.retrain_error_factor)
        .with_min_persist_interval(Duration::from_secs(toml.min_persist_interval_sec))
        .with_backfill_window_days(toml.backfill_window_days)
        .with_timezone(timezone))
}

pub fn build_forecast_config(toml: &ForecastToml) -> ForecastConfig {
    ForecastConfig::default()
        .with_default_confidence(toml.default_confidence)
        .with_horizon_max_days(toml.horizon_max_days)
        .with_order_lead_days(toml.order_lead_days)
        .with_minimum_order_unit(toml.minimum_order_unit)
        .with_low_stock_confidence(toml.low_stock_confidence)
        .with_batch_max_parallel(toml.batch_max_parallel)
}

pub fn build_pretrain_config(toml: &PretrainToml, seed: Option<u64>, days: Option<u32>) -> PretrainConfig {
    let mut config = PretrainConfig::default().with_days(days.unwrap_or(toml.days));
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    config
}
