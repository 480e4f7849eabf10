//! # Error Types
//!
//! Error handling for the chat protocol core.
//!
//! ## Error Categories
//! - **Framing Errors**: cursor overruns, truncated frames, CRC mismatches,
//!   unknown packet types and malformed fields. These are frame-local: the
//!   offending frame is dropped and decoding resumes at the next boundary.
//! - **Session Errors**: unknown connections, closed connections, timeouts
//! - **Store Errors**: failures reported by the user or chat store
//! - **I/O and Configuration Errors**
//!
//! Authentication and registration rejections are not errors; they travel
//! back to the peer as `ServerResponse` packets with a `Failed` status.
//!
//! ## Example Usage
//! ```rust
//! use chat_protocol::core::packet::Packet;
//! use chat_protocol::error::ProtocolError;
//!
//! match Packet::from_bytes(&[1, 0, 0]) {
//!     Err(ProtocolError::TruncatedFrame { .. }) => {}
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Dispatcher-related error messages
    pub const ERR_DISPATCHER_WRITE_LOCK: &str = "Failed to acquire write lock on dispatcher";
    pub const ERR_DISPATCHER_READ_LOCK: &str = "Failed to acquire read lock on dispatcher";
    pub const ERR_DUPLICATE_HANDLER: &str = "Handler is already registered";
    pub const ERR_CLIENT_STATE_LOCK: &str = "Client state lock poisoned";

    /// Store errors
    pub const ERR_STORE_LOCK_POISONED: &str = "Store lock poisoned";

    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_MAX_CONNECTIONS: &str = "Maximum number of connections reached";
    pub const ERR_NOT_AUTHENTICATED: &str = "Not logged in";

    /// Wire-level rejection messages carried in `ServerResponse` packets
    pub const MSG_NOT_REGISTERED: &str = "not registered";
    pub const MSG_WRONG_PASSWORD: &str = "wrong password";
    pub const MSG_USERNAME_TAKEN: &str = "username taken";
    pub const MSG_REGISTRATION_FAILED: &str = "registration failed";
}

// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Read of {requested} bytes at offset {position} exceeds buffer of {len} bytes")]
    OutOfBounds {
        position: usize,
        requested: usize,
        len: usize,
    },

    #[error("Truncated frame: need {needed} bytes, have {available}")]
    TruncatedFrame { needed: usize, available: usize },

    #[error("CRC mismatch: header says {expected:#010x}, payload hashes to {actual:#010x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("Unknown packet type: {0}")]
    UnknownPacketType(u8),

    #[error("Invalid value {value} for field {field}")]
    InvalidValue { field: &'static str, value: u8 },

    #[error("Invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("String too long for wire format: {0} bytes")]
    StringTooLong(usize),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Unknown connection: {0}")]
    UnknownConnection(u64),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Errors confined to a single frame. The frame is dropped and the
    /// connection keeps going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProtocolError::OutOfBounds { .. }
                | ProtocolError::CrcMismatch { .. }
                | ProtocolError::UnknownPacketType(_)
                | ProtocolError::InvalidValue { .. }
                | ProtocolError::InvalidUtf8
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_local_errors_are_recoverable() {
        assert!(ProtocolError::UnknownPacketType(99).is_recoverable());
        assert!(ProtocolError::CrcMismatch {
            expected: 1,
            actual: 2
        }
        .is_recoverable());
        assert!(ProtocolError::OutOfBounds {
            position: 0,
            requested: 2,
            len: 1
        }
        .is_recoverable());
        assert!(!ProtocolError::OversizedPacket(1 << 30).is_recoverable());
        assert!(!ProtocolError::ConnectionClosed.is_recoverable());
    }

    #[test]
    fn display_includes_context() {
        let err = ProtocolError::TruncatedFrame {
            needed: 12,
            available: 9,
        };
        assert_eq!(err.to_string(), "Truncated frame: need 12 bytes, have 9");
    }
}
