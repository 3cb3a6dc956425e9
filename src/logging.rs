use tracing_subscriber::EnvFilter;

/// Workspace crate targets that receive log output, as one
/// `target=level` directive per crate.
const CRATE_TARGETS: &[&str] = &[
    "larder",
    "larder_checkpoint",
    "larder_features",
    "larder_forecast",
    "larder_models",
    "larder_pretrain",
    "larder_scheduler",
    "larder_ssm",
    "larder_store",
    "larder_trainer",
];

/// Maps the `-v` count to a level name: warn by default, then info,
/// debug, trace.
fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize tracing from the CLI verbosity. A set `RUST_LOG`
/// environment variable wins over the flag.
pub fn init(verbosity: u8) {
    let level = level_for(verbosity);
    let directives = CRATE_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
