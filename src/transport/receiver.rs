//! Frame receiver.
//!
//! Accumulates chunked transport reads in a receive buffer until the framing
//! decoder yields one complete frame body. A frame's bytes leave the buffer
//! as soon as the frame is extracted; bytes that already belong to the next
//! frame stay queued and are served by the following call.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::Decoder;
use tracing::{trace, warn};

use crate::core::codec::FrameCodec;
use crate::error::{ProtocolError, Result};

pub struct FrameReceiver {
    buffer: BytesMut,
    chunk: Vec<u8>,
    codec: FrameCodec,
}

impl FrameReceiver {
    /// `chunk_size` bounds each transport read; `max_frame_size` bounds the buffer.
    pub fn new(chunk_size: usize, max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(chunk_size),
            chunk: vec![0u8; chunk_size.max(1)],
            codec: FrameCodec::new(max_frame_size),
        }
    }

    /// Bytes currently held in the receive buffer
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Append one chunk and try to complete a frame.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Result<Option<Bytes>> {
        self.buffer.extend_from_slice(chunk);
        self.next_frame()
    }

    /// Extract a frame from already buffered bytes, if one is complete.
    ///
    /// A framing error discards the whole buffer: without a trusted length
    /// there is no way to find the next frame boundary.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        match self.codec.decode(&mut self.buffer) {
            Ok(frame) => Ok(frame),
            Err(e) => {
                warn!(error = %e, discarded = self.buffer.len(), "framing error, clearing receive buffer");
                self.buffer.clear();
                Err(e)
            }
        }
    }

    /// Read chunks from `reader` until one complete frame body is available.
    ///
    /// # Errors
    /// `ConnectionClosed` on end of stream, `Io` on transport failure,
    /// `OversizedFrame` when the peer announces a frame above the limit.
    pub async fn read_frame<R>(&mut self, reader: &mut R) -> Result<Bytes>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        if let Some(frame) = self.next_frame()? {
            return Ok(frame);
        }

        loop {
            let n = reader.read(&mut self.chunk).await?;
            if n == 0 {
                if !self.buffer.is_empty() {
                    warn!(partial = self.buffer.len(), "stream ended inside a frame");
                    self.buffer.clear();
                }
                return Err(ProtocolError::ConnectionClosed);
            }

            self.buffer.extend_from_slice(&self.chunk[..n]);
            trace!(bytes = n, buffered = self.buffer.len(), "chunk received");

            if let Some(frame) = self.next_frame()? {
                return Ok(frame);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::BufMut;
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::Encoder;

    fn framed(body: &[u8]) -> BytesMut {
        let mut out = BytesMut::new();
        FrameCodec::default().encode(body, &mut out).unwrap();
        out
    }

    #[test]
    fn completes_only_on_last_chunk() {
        let wire = framed(&[7u8; 3000]);
        let mut receiver = FrameReceiver::new(1024, 1 << 20);

        let chunks: Vec<&[u8]> = wire.chunks(1024).collect();
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(receiver.push_chunk(chunk).unwrap().is_none());
        }
        let frame = receiver.push_chunk(chunks[chunks.len() - 1]).unwrap().unwrap();
        assert_eq!(frame.len(), 3000);
        assert_eq!(receiver.buffered(), 0);
    }

    #[test]
    fn oversized_claim_clears_buffer() {
        let mut receiver = FrameReceiver::new(16, 64);
        let mut claim = BytesMut::new();
        claim.put_u32(65);
        claim.put_slice(&[1, 2, 3]);

        assert!(matches!(
            receiver.push_chunk(&claim),
            Err(ProtocolError::OversizedFrame(65))
        ));
        assert_eq!(receiver.buffered(), 0);
    }

    #[tokio::test]
    async fn reads_back_to_back_frames() {
        let (mut writer, mut reader) = tokio::io::duplex(4096);
        let mut wire = framed(b"first");
        wire.extend_from_slice(&framed(b"second"));
        writer.write_all(&wire).await.unwrap();

        let mut receiver = FrameReceiver::new(1024, 1 << 20);
        assert_eq!(&receiver.read_frame(&mut reader).await.unwrap()[..], b"first");
        assert_eq!(&receiver.read_frame(&mut reader).await.unwrap()[..], b"second");
        assert_eq!(receiver.buffered(), 0);
    }

    #[tokio::test]
    async fn end_of_stream_is_connection_closed() {
        let (mut writer, mut reader) = tokio::io::duplex(64);
        writer.write_all(&framed(b"cut")[..5]).await.unwrap();
        drop(writer);

        let mut receiver = FrameReceiver::new(1024, 1 << 20);
        assert!(matches!(
            receiver.read_frame(&mut reader).await,
            Err(ProtocolError::ConnectionClosed)
        ));
        assert_eq!(receiver.buffered(), 0);
    }
}
