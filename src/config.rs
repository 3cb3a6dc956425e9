use std::path::PathBuf;

use serde::Deserialize;

/// Top-level larder configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LarderConfig {
    /// Global RNG seed.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Directory holding `items/` and `pretrained/` checkpoints.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Trainer settings.
    #[serde(default)]
    pub trainer: TrainerToml,

    /// Forecast facade settings.
    #[serde(default)]
    pub forecast: ForecastToml,

    /// Pretrain settings.
    #[serde(default)]
    pub pretrain: PretrainToml,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("larder-data")
}

impl Default for LarderConfig {
    fn default() -> Self {
        Self {
            seed: None,
            data_dir: default_data_dir(),
            trainer: TrainerToml::default(),
            forecast: ForecastToml::default(),
            pretrain: PretrainToml::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainerToml {
    #[serde(default = "default_ewma_alpha")]
    pub ewma_alpha: f64,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_retrain_interval_days")]
    pub retrain_interval_days: i64,
    #[serde(default = "default_retrain_error_factor")]
    pub retrain_error_factor: f64,
    #[serde(default = "default_min_persist_interval_sec")]
    pub min_persist_interval_sec: u64,
    #[serde(default = "default_backfill_window_days")]
    pub backfill_window_days: i64,
    #[serde(default = "default_timezone_offset_sec")]
    pub timezone_offset_sec: i32,
}

impl Default for TrainerToml {
    fn default() -> Self {
        Self {
            ewma_alpha: default_ewma_alpha(),
            learning_rate: default_learning_rate(),
            retrain_interval_days: default_retrain_interval_days(),
            retrain_error_factor: default_retrain_error_factor(),
            min_persist_interval_sec: default_min_persist_interval_sec(),
            backfill_window_days: default_backfill_window_days(),
            timezone_offset_sec: default_timezone_offset_sec(),
        }
    }
}

fn default_ewma_alpha() -> f64 {
    0.3
}
fn default_learning_rate() -> f64 {
    1e-3
}
fn default_retrain_interval_days() -> i64 {
    7
}
fn default_retrain_error_factor() -> f64 {
    0.5
}
fn default_min_persist_interval_sec() -> u64 {
    60
}
fn default_backfill_window_days() -> i64 {
    90
}
fn default_timezone_offset_sec() -> i32 {
    0
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForecastToml {
    #[serde(default = "default_confidence")]
    pub default_confidence: f64,
    #[serde(default = "default_horizon_max_days")]
    pub horizon_max_days: u32,
    #[serde(default = "default_order_lead_days")]
    pub order_lead_days: i64,
    #[serde(default = "default_minimum_order_unit")]
    pub minimum_order_unit: f64,
    #[serde(default = "default_low_stock_confidence")]
    pub low_stock_confidence: f64,
    #[serde(default = "default_batch_max_parallel")]
    pub batch_max_parallel: usize,
}

impl Default for ForecastToml {
    fn default() -> Self {
        Self {
            default_confidence: default_confidence(),
            horizon_max_days: default_horizon_max_days(),
            order_lead_days: default_order_lead_days(),
            minimum_order_unit: default_minimum_order_unit(),
            low_stock_confidence: default_low_stock_confidence(),
            batch_max_parallel: default_batch_max_parallel(),
        }
    }
}

fn default_confidence() -> f64 {
    0.95
}
fn default_horizon_max_days() -> u32 {
    90
}
fn default_order_lead_days() -> i64 {
    3
}
fn default_minimum_order_unit() -> f64 {
    1.0
}
fn default_low_stock_confidence() -> f64 {
    0.5
}
fn default_batch_max_parallel() -> usize {
    4
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PretrainToml {
    #[serde(default = "default_pretrain_days")]
    pub days: u32,
}

impl Default for PretrainToml {
    fn default() -> Self {
        Self {
            days: default_pretrain_days(),
        }
    }
}

fn default_pretrain_days() -> u32 {
    60
}
