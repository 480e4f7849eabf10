//! # Frame Envelope
//!
//! ```text
//! [Type(1)] [PayloadLen(4, LE)] [CRC32(4, LE)] [Payload(N)]
//! ```
//!
//! The CRC covers the payload only. A frame whose CRC does not match is
//! rejected as a whole; no field of it is ever handed out.

use crate::core::cursor::ByteCursor;
use crate::core::packet::{Packet, PacketType};
use crate::error::{ProtocolError, Result};

/// Size of the fixed frame header in bytes.
pub const HEADER_LEN: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw type byte; may not name a known packet type.
    pub packet_type: u8,
    pub payload_len: u32,
    pub crc32: u32,
}

impl FrameHeader {
    /// Inspect the header at the front of `buf` without consuming anything.
    /// Returns `None` while fewer than [`HEADER_LEN`] bytes are present.
    pub fn peek(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        let mut cursor = ByteCursor::from_bytes(&buf[..HEADER_LEN]);
        Self::read(&mut cursor).ok()
    }

    fn read(cursor: &mut ByteCursor) -> Result<Self> {
        Ok(Self {
            packet_type: cursor.read_u8()?,
            payload_len: cursor.read_u32_le()?,
            crc32: cursor.read_u32_le()?,
        })
    }

    /// Header plus payload.
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.payload_len as usize
    }
}

/// CRC-32 (IEEE) of `data`.
pub fn checksum(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Build a raw frame around an arbitrary payload.
pub fn encode_raw(packet_type: u8, payload: &[u8]) -> Result<Vec<u8>> {
    let payload_len =
        u32::try_from(payload.len()).map_err(|_| ProtocolError::OversizedPacket(payload.len()))?;
    let mut out = ByteCursor::with_capacity(HEADER_LEN + payload.len());
    out.write_u8(packet_type);
    out.write_u32_le(payload_len);
    out.write_u32_le(checksum(payload));
    out.write_bytes(payload);
    Ok(out.into_inner())
}

/// Serialize `packet` into a complete frame.
pub fn encode(packet: &Packet) -> Result<Vec<u8>> {
    let mut payload = ByteCursor::new();
    packet.encode_payload(&mut payload)?;
    encode_raw(packet.packet_type().as_byte(), payload.as_slice())
}

/// Decode one complete frame from the front of `bytes`.
///
/// The CRC is verified before the type byte is interpreted, so an unknown
/// type is only reported for frames that arrived intact.
pub fn decode(bytes: &[u8]) -> Result<Packet> {
    let mut cursor = ByteCursor::from_bytes(bytes);
    let header = FrameHeader::read(&mut cursor).map_err(|_| ProtocolError::TruncatedFrame {
        needed: HEADER_LEN,
        available: bytes.len(),
    })?;

    let payload_len = header.payload_len as usize;
    if cursor.available_bytes() < payload_len {
        return Err(ProtocolError::TruncatedFrame {
            needed: header.frame_len(),
            available: bytes.len(),
        });
    }
    let mut payload = ByteCursor::from_bytes(cursor.read_bytes(payload_len)?);

    let actual = checksum(payload.as_slice());
    if actual != header.crc32 {
        return Err(ProtocolError::CrcMismatch {
            expected: header.crc32,
            actual,
        });
    }

    let packet_type = PacketType::from_byte(header.packet_type)?;
    Packet::decode_payload(packet_type, &mut payload)
}
