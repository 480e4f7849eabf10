//! # Chat Protocol
//!
//! Framed binary chat protocol: a bounds-checked byte cursor, CRC-checked
//! frames, stream reassembly, visitor-style packet dispatch and a salted
//! challenge-response login, with a tokio TCP server and client on top.
//!
//! ## Layers
//! - [`core`]: cursor, packet schemas, frame encode/decode, tokio codec
//! - [`protocol`]: reassembly, dispatch, sessions and the business handlers
//! - [`store`]: user and chat store traits plus in-memory implementations
//! - [`transport`]: TCP server and client
//! - [`utils`]: diagnostics, logging, metrics, password hashing
//!
//! ## Example
//! ```rust
//! use chat_protocol::core::packet::{Auth, Packet};
//! use chat_protocol::protocol::reassembler::FrameAssembler;
//!
//! let bytes = Packet::Auth(Auth::request_salt("alice")).to_bytes().unwrap();
//! let mut assembler = FrameAssembler::default();
//!
//! let (head, tail) = bytes.split_at(5);
//! assert!(assembler.push(head).is_empty());
//! assert_eq!(assembler.push(tail).len(), 1);
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod store;
pub mod transport;
pub mod utils;

pub use crate::core::codec::PacketCodec;
pub use crate::core::cursor::ByteCursor;
pub use crate::core::packet::{
    Auth, ChatList, Message, Packet, PacketType, Register, ResponseStatus, ResponseType,
    ServerResponse,
};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::dispatcher::{Dispatcher, HandlerContext, Handling, Outbox, PacketHandler};
pub use crate::protocol::session::{AuthPhase, AuthSession, ConnectionSession, SessionRegistry};
