//! # Error Types
//!
//! Error handling for the packet session layer.
//!
//! This module defines every error variant a session operation can produce,
//! from low-level I/O failures to handshake violations.
//!
//! ## Error Categories
//! - **I/O Errors**: transport read/write/connect failures
//! - **Codec Errors**: undecodable frames, oversized frames
//! - **Session Errors**: operations requested in the wrong state, closed transports
//! - **Handshake Errors**: unknown or malformed management commands
//!
//! Most of these never reach the consumer: decode and handshake failures are
//! absorbed by the session and turned into replies or log lines. The ones that
//! do surface are returned through [`Result`].
//!
//! ## Example Usage
//! ```rust
//! use packet_session::core::codec::PacketCodec;
//! use packet_session::error::ProtocolError;
//!
//! let codec = PacketCodec::default();
//! match codec.decode(&[0xFF, 0x01, 0x00]) {
//!     Err(ProtocolError::Decode(reason)) => println!("rejected: {reason}"),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::io;
use thiserror::Error;

use crate::protocol::state::SessionState;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Codec errors
    pub const ERR_EMPTY_FRAME: &str = "Frame body is empty";
    pub const ERR_TRUNCATED_HEADER: &str = "Frame body shorter than codec header";

    /// Handshake errors
    pub const ERR_EMPTY_COMMAND: &str = "Empty management command";
    pub const ERR_BINARY_COMMAND: &str = "Management payload is not text";
    pub const ERR_MISSING_NAME: &str = "setup_resp requires a name";
}

// ProtocolError is the primary error type for all session operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Connect failed: {0}")]
    ConnectFailure(String),

    #[error("Handshake protocol error: {0}")]
    Handshake(String),

    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Transport already closed")]
    AlreadyClosed,

    #[error("Frame too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl ProtocolError {
    /// Errors after which the transport can no longer be trusted and is released.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(_) | ProtocolError::ConnectionClosed | ProtocolError::OversizedFrame(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
