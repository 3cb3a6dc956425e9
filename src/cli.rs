use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Larder consumption forecasting core.
#[derive(Parser)]
#[command(
    name = "larder",
    version,
    about = "Household consumption forecasting core"
)]
pub struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, default_value = "larder.toml")]
    pub config: PathBuf,

    /// Override global RNG seed from config.
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Generate category warm-start checkpoints from synthetic data.
    Pretrain(PretrainArgs),
    /// Ingest an item's history and print its forecast.
    Forecast(ForecastArgs),
}

/// Arguments for the `pretrain` subcommand.
#[derive(Args)]
pub struct PretrainArgs {
    /// Override the number of synthetic days from config.
    #[arg(long)]
    pub days: Option<u32>,
}

/// Arguments for the `forecast` subcommand.
#[derive(Args)]
pub struct ForecastArgs {
    /// Item identifier.
    #[arg(long)]
    pub item: String,

    /// Item category (warm-start key).
    #[arg(long)]
    pub category: String,

    /// Low-stock threshold.
    #[arg(long, default_value_t = 0.0)]
    pub quantity_min: f64,

    /// Full-stock quantity.
    #[arg(long)]
    pub quantity_max: f64,

    /// Whether the item is perishable.
    #[arg(long)]
    pub perishable: bool,

    /// Household size.
    #[arg(long, default_value_t = 2)]
    pub household: u32,

    /// Optional CSV history (`timestamp,quantity` per line, RFC 3339).
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Forecast horizon in days.
    #[arg(long, default_value_t = 14)]
    pub horizon: u32,
}
