//! # Core Protocol Components
//!
//! Low-level byte handling, packet schemas, framing and the tokio codec.
//!
//! ## Components
//! - **Cursor**: bounds-checked byte buffer with a read position
//! - **Packet**: the closed set of packet variants and their payload schemas
//! - **Frame**: header, CRC32 and whole-frame encode/decode
//! - **Codec**: Tokio codec that reassembles frames from a byte stream
//!
//! ## Wire Format
//! ```text
//! [Type(1)] [PayloadLen(4)] [CRC32(4)] [Payload(N)]
//! String := [Len(2)] [UTF-8(Len)]
//! ```
//! All integers are little-endian.

pub mod codec;
pub mod cursor;
pub mod frame;
pub mod packet;
