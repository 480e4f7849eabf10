//! Tokio codec for chat frames.
//!
//! Decoding inspects the header to learn the frame length, waits until the
//! whole frame is buffered, then splits it off and decodes it. Frames that
//! fail CRC or schema checks are dropped and decoding continues with the
//! next frame in the buffer, so one corrupt frame never ends the stream.

use crate::config::MAX_PAYLOAD_SIZE;
use crate::core::frame::{self, FrameHeader, HEADER_LEN};
use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};
use crate::utils::diagnostics::{DiagnosticEvent, Diagnostics, TracingDiagnostics};
use bytes::BytesMut;
use std::fmt;
use std::sync::Arc;
use tokio_util::codec::{Decoder, Encoder};

#[derive(Clone)]
pub struct PacketCodec {
    max_payload_size: usize,
    diagnostics: Arc<dyn Diagnostics>,
}

impl PacketCodec {
    pub fn new(max_payload_size: usize, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            max_payload_size,
            diagnostics,
        }
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    pub fn diagnostics(&self) -> &Arc<dyn Diagnostics> {
        &self.diagnostics
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(MAX_PAYLOAD_SIZE, TracingDiagnostics::shared())
    }
}

impl fmt::Debug for PacketCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketCodec")
            .field("max_payload_size", &self.max_payload_size)
            .finish_non_exhaustive()
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            let Some(header) = FrameHeader::peek(src) else {
                return Ok(None);
            };

            let payload_len = header.payload_len as usize;
            if payload_len > self.max_payload_size {
                return Err(ProtocolError::OversizedPacket(payload_len));
            }

            let frame_len = header.frame_len();
            if src.len() < frame_len {
                src.reserve(frame_len - src.len());
                return Ok(None);
            }

            let bytes = src.split_to(frame_len);
            match frame::decode(&bytes) {
                Ok(packet) => {
                    self.diagnostics.emit(DiagnosticEvent::FrameDecoded {
                        packet_type: packet.packet_type(),
                        frame_len,
                    });
                    return Ok(Some(packet));
                }
                Err(error) => {
                    self.diagnostics
                        .emit(DiagnosticEvent::FrameDropped { frame_len, error: &error });
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>> {
        if let Some(packet) = self.decode(buf)? {
            return Ok(Some(packet));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        let needed = FrameHeader::peek(buf)
            .map(|h| h.frame_len())
            .unwrap_or(HEADER_LEN);
        Err(ProtocolError::TruncatedFrame {
            needed,
            available: buf.len(),
        })
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<()> {
        let bytes = frame::encode(&packet)?;
        let payload_len = bytes.len() - HEADER_LEN;
        if payload_len > self.max_payload_size {
            return Err(ProtocolError::OversizedPacket(payload_len));
        }

        dst.reserve(bytes.len());
        dst.extend_from_slice(&bytes);
        self.diagnostics.emit(DiagnosticEvent::FrameEncoded {
            packet_type: packet.packet_type(),
            frame_len: bytes.len(),
        });
        Ok(())
    }
}
