use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use larder_pretrain::SyntheticPretrainer;
use larder_store::FsModelStore;

use crate::cli::PretrainArgs;
use crate::config::LarderConfig;
use crate::convert;

/// Run the `pretrain` subcommand.
pub fn run(config_path: &Path, seed: Option<u64>, args: PretrainArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let seed = seed.or(config.seed);

    let models = Arc::new(
        FsModelStore::open(&config.data_dir)
            .with_context(|| format!("failed to open model store in {}", config.data_dir.display()))?,
    );

    let pretrain_config = convert::build_pretrain_config(&config.pretrain, seed, args.days);
    let pretrainer = SyntheticPretrainer::new(pretrain_config, models);
    let categories = pretrainer.run().context("pretraining failed")?;

    info!(n = categories.len(), "pretraining complete");
    for category in categories {
        println!("pretrained/{category}.ckpt");
    }
    Ok(())
}

/// Loads the TOML config, falling back to defaults if the file is
/// absent.
pub fn load_config(path: &Path) -> Result<LarderConfig> {
    if !path.exists() {
        return Ok(LarderConfig::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    toml::from_str(&text).context("failed to parse TOML config")
}
