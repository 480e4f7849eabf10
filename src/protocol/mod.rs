//! # Protocol Layer
//!
//! Everything between decoded packets and the transport.
//!
//! ## Components
//! - **Reassembler**: turns arbitrary byte chunks into complete packets
//! - **Dispatcher**: visitor-style routing of packets to registered handlers
//! - **Session**: per-connection receive buffer and login state
//! - **Auth**: server-side registration and challenge-response login
//! - **Chat**: message relay and chat listing
//! - **Client**: client-side login driver and event queue

pub mod auth;
pub mod chat;
pub mod client;
pub mod dispatcher;
pub mod reassembler;
pub mod session;
