//! Prometheus exporter for the digital inputs of USB I/O expansion boards.
//!
//! Reads a YAML configuration describing one or more boards and their pins,
//! polls every configured pin over the vendor register protocol, and exposes
//! the logical pin states as gauges on an HTTP `/metrics` endpoint.

mod board;
mod config;
mod daemon;
mod error;
mod metrics;
mod outcome;
mod tracing;
mod transport;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::config::Config;
use crate::daemon::Daemon;
use crate::tracing::prelude::*;

#[derive(Debug, Parser)]
#[command(version, about = "Prometheus exporter for USB I/O expansion board inputs")]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "/etc/ioboard-exporter/ioboard.yml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    crate::tracing::init_journald_or_stdout();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!("error loading config: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    info!("starting");

    match Daemon::new(config).run().await {
        Ok(()) => ExitCode::SUCCESS,
        // The daemon already logged the failure with context.
        Err(_) => ExitCode::FAILURE,
    }
}
