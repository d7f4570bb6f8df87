//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener settings.
    pub network: NetworkConfig,
    /// Broadcast cadence and socket deadlines.
    pub timing: TimingConfig,
    /// Capacity caps.
    pub limits: LimitsConfig,
    /// Log level override (e.g. "debug", "info", "warn").
    pub log_level: String,
}

/// TCP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind the listener to.
    pub bind_address: String,
    /// Listener port.
    pub port: u16,
}

/// Broadcast cadence and socket deadlines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    /// Pose broadcast interval in milliseconds (~60 Hz by default).
    pub pose_tick_ms: u64,
    /// Population-list broadcast interval in milliseconds.
    pub population_tick_ms: u64,
    /// Deadline for a single socket write before the client is treated as
    /// dead, in milliseconds.
    pub write_timeout_ms: u64,
}

/// Capacity caps. New logins/bodies beyond a cap are rejected with an
/// explicit error instead of growing the tables forever.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum concurrently connected viewers.
    pub max_clients: usize,
    /// Maximum concurrently tracked bodies.
    pub max_bodies: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 9055,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            pose_tick_ms: 16,
            population_tick_ms: 1000,
            write_timeout_ms: 250,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_clients: 64,
            max_bodies: 16,
        }
    }
}

/// File name looked up inside the config directory.
const CONFIG_FILE: &str = "posecast.ron";

impl RelayConfig {
    /// Load `posecast.ron` from the given directory. A missing file is not
    /// an error: defaults are written out and returned, so the first run
    /// leaves an editable config behind.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE);
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let config = ron::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?;
                log::info!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save(config_dir)?;
                log::info!("Wrote default config to {}", path.display());
                Ok(config)
            }
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    /// Write this config to `posecast.ron` in the given directory, creating
    /// the directory if needed.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let contents = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::new())?;
        let path = config_dir.join(CONFIG_FILE);
        std::fs::create_dir_all(config_dir)
            .and_then(|()| std::fs::write(&path, contents))
            .map_err(|source| ConfigError::Write { path, source })
    }
}
