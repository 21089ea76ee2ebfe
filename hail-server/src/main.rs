//! Hail dispatch server CLI.
//!
//! Run with: `cargo run -p hail-server -- --config config.json`

use clap::Parser;
use hail_server::{telemetry, Config, HailServer};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "hail-server", version, about = "Real-time ride-matching pipeline")]
struct Cli {
    /// Path to the JSON configuration file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_logging();
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load(&path),
        None => Config::defaults(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        group_id = %config.kafka.group_id,
        min_drivers = config.matching.min_drivers_to_return,
        "starting hail server"
    );

    let server = match HailServer::new(config).await {
        Ok(server) => server,
        Err(err) => {
            error!(error = %err, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    match server.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "server error");
            ExitCode::FAILURE
        }
    }
}
