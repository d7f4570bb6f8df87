//! Binary entry point for the posecast relay.
//!
//! Loads `posecast.ron` (creating it with defaults on first run), applies
//! CLI overrides, and runs the server until the process receives ctrl-c,
//! which triggers a graceful shutdown: the listener stops accepting, the
//! broadcast timers end, and every live socket is closed.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use posecast_config::{CliArgs, RelayConfig};
use posecast_relay::{RelayServer, telemetry};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    let config_dir = args.config.clone().unwrap_or_else(|| PathBuf::from("."));

    let mut config = match RelayConfig::load_or_create(&config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };
    config.apply_cli_overrides(&args);

    telemetry::init(&config.log_level);

    let server = Arc::new(RelayServer::new(config));
    let run_server = Arc::clone(&server);
    let mut run_task = tokio::spawn(async move { run_server.run().await });

    tokio::select! {
        result = &mut run_task => {
            // The accept loop only returns early on listener failure.
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    eprintln!("Relay failed: {e}");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Relay task panicked: {e}");
                    std::process::exit(1);
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received ctrl-c");
            server.shutdown();
            let _ = run_task.await;
        }
    }
}
