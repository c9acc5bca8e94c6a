#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod cli;

use cli::Cli;
use svalinn::GateConfig;

fn main() -> ExitCode {
    let args = Cli::parse();

    let config = match GateConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            cli::report_error(args.json, &err.into());
            return ExitCode::FAILURE;
        }
    };

    // Logs go to stderr so --json output on stdout stays machine-readable.
    let level = config.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    match cli::run(&args, &config) {
        Ok(code) => code,
        Err(err) => {
            cli::report_error(args.json, &err);
            ExitCode::FAILURE
        }
    }
}
