//! # Codecs
//!
//! Two layers turn a [`Packet`] into wire bytes:
//!
//! - [`PacketCodec`] (message codec) maps a packet to an opaque body and back.
//!   The body is `[version(1)] [format(1)] [serialized packet]`.
//! - [`FrameCodec`] delimits bodies on the byte stream with a length prefix:
//!   `[length(4, big-endian)] [body(length)]`.
//!
//! Frame boundaries come only from the length prefix. How the transport happens
//! to split or merge reads has no effect on where one frame ends.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::config::{CODEC_VERSION, MAX_FRAME_SIZE};
use crate::core::packet::Packet;
use crate::core::serialization::{MultiFormat, SerializationFormat};
use crate::error::{constants, ProtocolError, Result};

/// Length of the frame length prefix
pub const FRAME_HEADER_LEN: usize = 4;

/// Length of the body header written by [`PacketCodec`]
pub const BODY_HEADER_LEN: usize = 2;

/// Largest body the length prefix can describe
pub const MAX_LENGTH_PREFIX: usize = u32::MAX as usize;

/// Message codec: packet <-> frame body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketCodec {
    format: SerializationFormat,
}

impl PacketCodec {
    /// Codec that encodes with `format` (decoding accepts every format)
    pub fn new(format: SerializationFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> SerializationFormat {
        self.format
    }

    /// Deterministic serialization of category and payload.
    pub fn encode(&self, packet: &Packet) -> Result<Vec<u8>> {
        let serialized = packet.serialize_format(self.format)?;
        let mut body = Vec::with_capacity(BODY_HEADER_LEN + serialized.len());
        body.push(CODEC_VERSION);
        body.push(self.format.format_byte());
        body.extend_from_slice(&serialized);
        Ok(body)
    }

    /// Exact inverse of [`PacketCodec::encode`].
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` for empty, truncated, corrupted or
    /// version-mismatched bodies.
    pub fn decode(&self, body: &[u8]) -> Result<Packet> {
        let (version, format_byte, serialized) = match body {
            [] => return Err(ProtocolError::Decode(constants::ERR_EMPTY_FRAME.into())),
            [_] => return Err(ProtocolError::Decode(constants::ERR_TRUNCATED_HEADER.into())),
            [version, format, rest @ ..] => (*version, *format, rest),
        };

        if version != CODEC_VERSION {
            return Err(ProtocolError::Decode(format!(
                "unsupported codec version {version} (expected {CODEC_VERSION})"
            )));
        }

        let format = SerializationFormat::from_byte(format_byte).ok_or_else(|| {
            ProtocolError::Decode(format!("unknown format byte 0x{format_byte:02x}"))
        })?;

        Packet::deserialize_format(serialized, format)
    }
}

/// Length-prefixed framing for tokio byte streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// `max_frame_size` is capped at what the 32-bit length prefix can express.
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.min(MAX_LENGTH_PREFIX),
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if src.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if length > self.max_frame_size {
            return Err(ProtocolError::OversizedFrame(length));
        }

        let total = FRAME_HEADER_LEN + length;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(FRAME_HEADER_LEN);
        let frame = src.split_to(length).freeze();
        trace!(length, remaining = src.len(), "frame extracted");
        Ok(Some(frame))
    }
}

impl<'a> Encoder<&'a [u8]> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, body: &'a [u8], dst: &mut BytesMut) -> Result<()> {
        if body.len() > self.max_frame_size {
            return Err(ProtocolError::OversizedFrame(body.len()));
        }

        let length =
            u32::try_from(body.len()).map_err(|_| ProtocolError::OversizedFrame(body.len()))?;

        dst.reserve(FRAME_HEADER_LEN + body.len());
        dst.put_u32(length);
        dst.extend_from_slice(body);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn body_header_layout() {
        let codec = PacketCodec::new(SerializationFormat::Json);
        let body = codec.encode(&Packet::data("ping")).unwrap();
        assert_eq!(body[0], CODEC_VERSION);
        assert_eq!(body[1], SerializationFormat::Json.format_byte());
    }

    #[test]
    fn decoder_accepts_any_format() {
        let packet = Packet::response(vec![9u8; 32]);
        let body = PacketCodec::new(SerializationFormat::MessagePack)
            .encode(&packet)
            .unwrap();
        let decoded = PacketCodec::new(SerializationFormat::Bincode)
            .decode(&body)
            .unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn rejects_version_mismatch() {
        let mut body = PacketCodec::default().encode(&Packet::data("x")).unwrap();
        body[0] = CODEC_VERSION + 1;
        assert!(matches!(
            PacketCodec::default().decode(&body),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn rejects_unknown_format() {
        let mut body = PacketCodec::default().encode(&Packet::data("x")).unwrap();
        body[1] = 0x7F;
        assert!(matches!(
            PacketCodec::default().decode(&body),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn rejects_truncated_body() {
        let body = PacketCodec::default()
            .encode(&Packet::data("a longer text payload"))
            .unwrap();
        let truncated = &body[..body.len() - 5];
        assert!(PacketCodec::default().decode(truncated).is_err());
        assert!(PacketCodec::default().decode(&[]).is_err());
        assert!(PacketCodec::default().decode(&[CODEC_VERSION]).is_err());
    }

    #[test]
    fn frame_decode_waits_for_full_frame() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(&b"hello"[..], &mut buf).unwrap();

        let mut partial = BytesMut::from(&buf[..6]);
        assert!(codec.decode(&mut partial).unwrap().is_none());
        assert_eq!(partial.len(), 6);

        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn frame_decode_leaves_next_frame_queued() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(&b"one"[..], &mut buf).unwrap();
        codec.encode(&b"two"[..], &mut buf).unwrap();

        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"one");
        assert_eq!(buf.len(), FRAME_HEADER_LEN + 3);
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"two");
        assert!(buf.is_empty());
    }

    #[test]
    fn frame_limit_capped_at_length_prefix() {
        assert_eq!(FrameCodec::new(usize::MAX).max_frame_size(), MAX_LENGTH_PREFIX);
        assert_eq!(FrameCodec::new(1024).max_frame_size(), 1024);
    }

    #[test]
    fn oversized_frames_rejected_both_ways() {
        let mut codec = FrameCodec::new(8);
        let mut buf = BytesMut::new();
        assert!(matches!(
            codec.encode(&[0u8; 9][..], &mut buf),
            Err(ProtocolError::OversizedFrame(9))
        ));

        let mut claim = BytesMut::new();
        claim.put_u32(1_000);
        assert!(matches!(
            codec.decode(&mut claim),
            Err(ProtocolError::OversizedFrame(1_000))
        ));
    }
}
