mod cli;
mod config;
mod convert;
mod forecast_cmd;
mod logging;
mod pretrain_cmd;

use std::process;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Command};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Pretrain(args) => pretrain_cmd::run(&cli.config, cli.seed, args),
        Command::Forecast(args) => forecast_cmd::run(&cli.config, args),
    }
}
