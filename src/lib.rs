//! # packet-session
//!
//! Peer-to-peer session layer that exchanges typed packets over a persistent
//! byte stream.
//!
//! A [`Session`] owns one transport (a TCP socket it dials itself, or any
//! already-connected `AsyncRead + AsyncWrite` stream such as a TLS stream),
//! frames packets with a length prefix, answers the `setup` name-exchange
//! handshake on its own, and delivers everything else to subscribed
//! listeners.
//!
//! ```text
//! Packet -> PacketCodec -> FrameSender  -> transport
//! transport -> FrameReceiver -> PacketCodec -> handshake | listeners
//! ```
//!
//! ## Quick start
//! ```rust,no_run
//! use packet_session::{Packet, Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> packet_session::Result<()> {
//!     let session = packet_session::transport::tcp::connect(
//!         "127.0.0.1",
//!         7000,
//!         SessionConfig::default().with_display_name("Bob"),
//!     )
//!     .await?;
//!
//!     session.request_name().await?;
//!     session.read().await?;
//!     if let Some(reply) = session.request(Packet::data("hello")).await? {
//!         println!("{:?}", reply.payload());
//!     }
//!
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! The library never installs a tracing subscriber; call
//! [`utils::logging::init_logging`] from the binary if you want one.

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::config::{PeerConfig, SessionConfig};
pub use crate::core::packet::{Category, Packet, Payload};
pub use crate::core::serialization::SerializationFormat;
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::state::SessionState;
pub use crate::service::{Completion, Session};
