//! Stream reassembly.
//!
//! TCP hands over bytes in chunks of any size. [`FrameAssembler`] keeps the
//! bytes of one connection, hands back every frame completed by a new chunk
//! and keeps a trailing partial frame buffered for the next one.

use crate::core::codec::PacketCodec;
use crate::core::frame::{FrameHeader, HEADER_LEN};
use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};
use crate::utils::diagnostics::DiagnosticEvent;
use bytes::BytesMut;
use tokio_util::codec::Decoder;

#[derive(Debug)]
pub struct FrameAssembler {
    buffer: BytesMut,
    codec: PacketCodec,
}

impl FrameAssembler {
    pub fn new(codec: PacketCodec) -> Self {
        Self {
            buffer: BytesMut::new(),
            codec,
        }
    }

    /// Append `chunk` and return every packet it completed, in arrival order.
    ///
    /// Corrupt frames are dropped by the codec. A header declaring an
    /// oversized payload means the stream can no longer be framed, so the
    /// buffered bytes are discarded and reassembly starts over with the next
    /// chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Packet> {
        self.buffer.extend_from_slice(chunk);

        let mut packets = Vec::new();
        loop {
            match self.codec.decode(&mut self.buffer) {
                Ok(Some(packet)) => packets.push(packet),
                Ok(None) => break,
                Err(error) => {
                    self.codec.diagnostics().emit(DiagnosticEvent::BufferDiscarded {
                        discarded: self.buffer.len(),
                        error: &error,
                    });
                    self.buffer.clear();
                    break;
                }
            }
        }
        packets
    }

    /// Bytes waiting for the rest of their frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Called when the stream ends. Leftover bytes mean the last frame never
    /// completed.
    pub fn finish(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let needed = FrameHeader::peek(&self.buffer)
            .map(|h| h.frame_len())
            .unwrap_or(HEADER_LEN);
        let available = self.buffer.len();
        self.buffer.clear();
        Err(ProtocolError::TruncatedFrame { needed, available })
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(PacketCodec::default())
    }
}
