//! Tracing subscriber setup for the relay binary.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging.
///
/// Console output with uptime timestamps, module paths, and severity.
/// `RUST_LOG` wins when set; otherwise the config's `log_level` applies,
/// falling back to `info` when that is empty. Calling this twice is a
/// no-op, so tests can initialize freely.
pub fn init(log_level: &str) {
    let filter_str = if log_level.is_empty() {
        "info"
    } else {
        log_level
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init();
}
