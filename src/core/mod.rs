//! # Core Protocol Components
//!
//! Packet model, codecs, and binary serialization.
//!
//! ## Components
//! - **Packet**: categorized message with a text or binary payload
//! - **Codec**: message codec plus length-prefixed framing over byte streams
//! - **Serialization**: bincode / JSON / MessagePack body formats
//!
//! ## Wire Format
//! ```text
//! [Length(4)] [Version(1)] [Format(1)] [Serialized packet(Length - 2)]
//! ```
//!
//! ## Security
//! - Maximum frame size: 16MB by default (prevents memory exhaustion)
//! - Length validation before allocation

pub mod codec;
pub mod packet;
pub mod serialization;
