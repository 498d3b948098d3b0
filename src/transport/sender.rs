//! Send pipeline: frames an encoded body and writes it out in chunks.

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Encoder;
use tracing::trace;

use crate::core::codec::FrameCodec;
use crate::error::Result;

pub struct FrameSender {
    codec: FrameCodec,
    chunk_size: usize,
}

impl FrameSender {
    pub fn new(chunk_size: usize, max_frame_size: usize) -> Self {
        Self {
            codec: FrameCodec::new(max_frame_size),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Write one frame; returns the number of bytes put on the wire.
    ///
    /// Each chunk goes through `write_all`, so a transport that accepts
    /// fewer bytes per call is driven until the whole frame is out.
    pub async fn write_frame<W>(&mut self, writer: &mut W, body: &[u8]) -> Result<usize>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut wire = BytesMut::new();
        self.codec.encode(body, &mut wire)?;

        for chunk in wire.chunks(self.chunk_size) {
            writer.write_all(chunk).await?;
        }
        writer.flush().await?;

        trace!(bytes = wire.len(), "frame written");
        Ok(wire.len())
    }
}
