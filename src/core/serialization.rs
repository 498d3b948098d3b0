//! # Serialization Formats
//!
//! Abstraction over the serialization formats a packet body may use.
//! Supports bincode (default), JSON (debugging/interop), and MessagePack (compact encoding).
//!
//! The format is recorded in the frame body by [`crate::core::codec::PacketCodec`],
//! so a receiver decodes whatever format the sender picked.
//!
//! ## Performance Characteristics
//! - **Bincode**: fastest, binary
//! - **MessagePack**: compact, binary
//! - **JSON**: human-readable, text

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    /// Binary compact format (default, fastest)
    #[default]
    Bincode,
    /// Human-readable JSON format (debugging, interop)
    Json,
    /// Compact binary format (MessagePack, efficient)
    #[serde(alias = "msgpack")]
    MessagePack,
}

impl SerializationFormat {
    /// Get the format identifier byte for wire protocol
    pub fn format_byte(self) -> u8 {
        match self {
            SerializationFormat::Bincode => 0x01,
            SerializationFormat::Json => 0x02,
            SerializationFormat::MessagePack => 0x03,
        }
    }

    /// Detect format from identifier byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(SerializationFormat::Bincode),
            0x02 => Some(SerializationFormat::Json),
            0x03 => Some(SerializationFormat::MessagePack),
            _ => None,
        }
    }

    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            SerializationFormat::Bincode => "Bincode",
            SerializationFormat::Json => "JSON",
            SerializationFormat::MessagePack => "MessagePack",
        }
    }
}

/// Trait for types that support multiple serialization formats
pub trait MultiFormat: Serialize + for<'de> Deserialize<'de> + Sized {
    /// Serialize to bytes using the specified format
    fn serialize_format(&self, format: SerializationFormat) -> Result<Vec<u8>> {
        match format {
            SerializationFormat::Bincode => Ok(bincode::serialize(self)?),
            SerializationFormat::Json => {
                serde_json::to_vec(self).map_err(|e| ProtocolError::SerializeError(e.to_string()))
            }
            SerializationFormat::MessagePack => {
                rmp_serde::to_vec(self).map_err(|e| ProtocolError::SerializeError(e.to_string()))
            }
        }
    }

    /// Deserialize from bytes using the specified format
    fn deserialize_format(data: &[u8], format: SerializationFormat) -> Result<Self> {
        match format {
            SerializationFormat::Bincode => {
                bincode::deserialize(data).map_err(|e| ProtocolError::Decode(e.to_string()))
            }
            SerializationFormat::Json => {
                serde_json::from_slice(data).map_err(|e| ProtocolError::Decode(e.to_string()))
            }
            SerializationFormat::MessagePack => {
                rmp_serde::from_slice(data).map_err(|e| ProtocolError::Decode(e.to_string()))
            }
        }
    }
}

impl MultiFormat for crate::core::packet::Packet {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::packet::Packet;

    const FORMATS: [SerializationFormat; 3] = [
        SerializationFormat::Bincode,
        SerializationFormat::Json,
        SerializationFormat::MessagePack,
    ];

    #[test]
    #[allow(clippy::expect_used)]
    fn test_format_byte_roundtrip() {
        for format in FORMATS {
            let byte = format.format_byte();
            let recovered = SerializationFormat::from_byte(byte).expect("valid format byte");
            assert_eq!(format, recovered);
        }
        assert_eq!(SerializationFormat::from_byte(0x7F), None);
    }

    #[test]
    fn test_default_format() {
        assert_eq!(SerializationFormat::default(), SerializationFormat::Bincode);
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_packet_in_every_format() {
        let packet = Packet::data(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        for format in FORMATS {
            let bytes = packet.serialize_format(format).expect("serialize");
            let recovered = Packet::deserialize_format(&bytes, format).expect("deserialize");
            assert_eq!(packet, recovered, "{}", format.name());
        }
    }

    #[test]
    fn test_json_is_readable() {
        let bytes = Packet::response("Hello, JSON!")
            .serialize_format(SerializationFormat::Json)
            .unwrap_or_default();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("Hello, JSON!"));
        assert!(text.contains("Response"));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let result = Packet::deserialize_format(b"{not json", SerializationFormat::Json);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
