//! # Session Protocol
//!
//! State machine, handshake sub-protocol, and listener registry used by
//! [`crate::service::session::Session`].

pub mod dispatcher;
pub mod handshake;
pub mod state;
