//! # Transport Layer
//!
//! Tokio TCP server and client around the protocol core.
//!
//! The server runs one task per connection. Each task owns its
//! [`ConnectionSession`](crate::protocol::session::ConnectionSession), writes
//! every reply as one whole frame and relays broadcasts from the other
//! connections through a shared `tokio::sync::broadcast` channel.

pub mod tcp;

pub use tcp::{server_dispatcher, ChatClient, ChatServer};
