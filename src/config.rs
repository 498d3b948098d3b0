//! # Configuration Management
//!
//! Centralized configuration for packet sessions.
//!
//! This module provides structured configuration for a peer: the session
//! parameters (display name, chunk size, frame limit, body format) and
//! logging output.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Environment variables via `from_env()`
//! - Direct instantiation with defaults
//!
//! ## Security Considerations
//! - The frame limit (16 MB default) bounds the receive buffer
//! - The read chunk size bounds every individual transport read

use crate::core::serialization::SerializationFormat;
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// Version byte written at the start of every frame body
pub const CODEC_VERSION: u8 = 1;

/// Max allowed frame body size (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Size of the fixed buffer used for each chunked transport read
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Full peer configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PeerConfig {
    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PeerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("PACKET_SESSION_DISPLAY_NAME") {
            config.session.display_name = Some(name);
        }

        if let Ok(size) = std::env::var("PACKET_SESSION_READ_CHUNK_SIZE") {
            config.session.read_chunk_size = size.parse::<usize>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid PACKET_SESSION_READ_CHUNK_SIZE: {e}"))
            })?;
        }

        if let Ok(size) = std::env::var("PACKET_SESSION_MAX_FRAME_SIZE") {
            config.session.max_frame_size = size.parse::<usize>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid PACKET_SESSION_MAX_FRAME_SIZE: {e}"))
            })?;
        }

        if let Ok(format) = std::env::var("PACKET_SESSION_FORMAT") {
            config.session.format = parse_format(&format)?;
        }

        if let Ok(level) = std::env::var("PACKET_SESSION_LOG_LEVEL") {
            config.logging.log_level = level
                .parse::<Level>()
                .map_err(|_| ProtocolError::ConfigError(format!("Invalid log level: {level}")))?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = self.session.validate();
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn parse_format(value: &str) -> Result<SerializationFormat> {
    match value.to_ascii_lowercase().as_str() {
        "bincode" => Ok(SerializationFormat::Bincode),
        "json" => Ok(SerializationFormat::Json),
        "messagepack" | "msgpack" => Ok(SerializationFormat::MessagePack),
        other => Err(ProtocolError::ConfigError(format!(
            "Unknown serialization format: {other}"
        ))),
    }
}

/// Per-session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name this session reports when the peer sends `setup`
    pub display_name: Option<String>,

    /// Bytes requested per transport read
    pub read_chunk_size: usize,

    /// Largest accepted frame body
    pub max_frame_size: usize,

    /// Body format used when encoding
    pub format: SerializationFormat,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display_name: None,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            max_frame_size: MAX_FRAME_SIZE,
            format: SerializationFormat::default(),
        }
    }
}

impl SessionConfig {
    /// Set the display name
    pub fn with_display_name<S: Into<String>>(mut self, name: S) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the read chunk size
    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Set the body format
    pub fn with_format(mut self, format: SerializationFormat) -> Self {
        self.format = format;
        self
    }

    /// Validate session configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Some(name) = &self.display_name {
            if name.trim().is_empty() {
                errors.push("Display name cannot be blank when set".to_string());
            } else if name.contains('\n') {
                errors.push("Display name cannot contain line breaks".to_string());
            }
        }

        if self.read_chunk_size == 0 {
            errors.push("Read chunk size must be greater than 0".to_string());
        } else if self.read_chunk_size > 1024 * 1024 {
            errors.push(format!(
                "Read chunk size too large: {} bytes (maximum: 1 MB)",
                self.read_chunk_size
            ));
        }

        if self.max_frame_size < 64 {
            errors.push("Max frame size too small (minimum: 64 bytes)".to_string());
        } else if self.max_frame_size > u32::MAX as usize {
            errors.push(format!(
                "Max frame size too large: {} bytes (length prefix is 32 bits)",
                self.max_frame_size
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("packet-session"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
