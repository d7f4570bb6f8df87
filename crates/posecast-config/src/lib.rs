//! Configuration for the posecast relay.
//!
//! Settings persist to disk as a RON file and can be overridden per-run via
//! clap CLI flags. Unknown fields in an old config file deserialize to
//! defaults, so the format is forward compatible.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{LimitsConfig, NetworkConfig, RelayConfig, TimingConfig};
pub use error::ConfigError;
