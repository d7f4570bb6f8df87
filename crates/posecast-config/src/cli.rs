//! Command-line argument parsing for the relay binary.

use std::path::PathBuf;

use clap::Parser;

use crate::RelayConfig;

/// Posecast relay command-line arguments.
///
/// CLI values override settings loaded from `posecast.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "posecast-relay", about = "Body-pose broadcast relay")]
pub struct CliArgs {
    /// Address to bind the listener to.
    #[arg(long)]
    pub bind: Option<String>,

    /// Listener port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Pose broadcast interval in milliseconds.
    #[arg(long)]
    pub pose_tick_ms: Option<u64>,

    /// Population broadcast interval in milliseconds.
    #[arg(long)]
    pub population_tick_ms: Option<u64>,

    /// Maximum concurrently connected viewers.
    #[arg(long)]
    pub max_clients: Option<usize>,

    /// Maximum concurrently tracked bodies.
    #[arg(long)]
    pub max_bodies: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl RelayConfig {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref bind) = args.bind {
            self.network.bind_address = bind.clone();
        }
        if let Some(port) = args.port {
            self.network.port = port;
        }
        if let Some(ms) = args.pose_tick_ms {
            self.timing.pose_tick_ms = ms;
        }
        if let Some(ms) = args.population_tick_ms {
            self.timing.population_tick_ms = ms;
        }
        if let Some(n) = args.max_clients {
            self.limits.max_clients = n;
        }
        if let Some(n) = args.max_bodies {
            self.limits.max_bodies = n;
        }
        if let Some(ref level) = args.log_level {
            self.log_level = level.clone();
        }
    }
}
