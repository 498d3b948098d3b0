//! Structured logging setup.
//!
//! The library only emits `tracing` events. Binaries and tests that want to
//! see them install a subscriber once with [`init_logging`].

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};

/// Install a global fmt subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over `config.log_level` when it is set.
///
/// # Errors
/// Returns `ProtocolError::ConfigError` if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_ascii_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| {
        ProtocolError::ConfigError(format!(
            "Failed to install subscriber for {}: {e}",
            config.app_name
        ))
    })
}
