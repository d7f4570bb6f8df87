//! Error type for config persistence.

use std::path::PathBuf;

/// Failure while loading or persisting the relay config file.
///
/// Every filesystem variant carries the path involved, so the startup
/// error message names the exact file to look at.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("cannot read config at {}: {source}", .path.display())]
    Read {
        /// Path of the unreadable file.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file (or its directory) could not be written.
    #[error("cannot write config at {}: {source}", .path.display())]
    Write {
        /// Path being written.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file's contents are not a valid relay config.
    #[error("{} is not a valid relay config: {source}", .path.display())]
    Parse {
        /// Path of the malformed file.
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },

    /// The in-memory config could not be serialized to RON.
    #[error("config serialization failed: {0}")]
    Serialize(#[from] ron::Error),
}
