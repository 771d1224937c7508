//! # housing-features command line
//!
//! ```bash
//! housing-features transform --input houses.csv --output features.csv
//! housing-features transform --input payload.json --mode training --report
//! housing-features fit-thresholds --reference train.csv --output config/clip_thresholds.json
//! housing-features schema --config-dir config
//! ```
//!
//! Set `RUST_LOG=debug` (or pass `--verbose`) to trace every stage.

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout)] // Allow println! in main binary

mod cli;

use anyhow::Result;
use clap::Parser as _;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    housing_features::logging::init(&cli.log_options())?;
    cli::run_command(cli.command)
}
