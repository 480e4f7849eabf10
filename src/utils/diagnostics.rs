//! Diagnostic events
//!
//! Components never reach for a process-wide logger. They are handed an
//! `Arc<dyn Diagnostics>` at construction and report what happened through
//! it. [`TracingDiagnostics`] forwards events to `tracing`;
//! [`Metrics`](crate::utils::metrics::Metrics) counts them.

use crate::core::packet::PacketType;
use crate::error::ProtocolError;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Something observable happened inside the protocol core.
#[derive(Debug, Clone, Copy)]
pub enum DiagnosticEvent<'a> {
    /// A complete frame was decoded.
    FrameDecoded {
        packet_type: PacketType,
        frame_len: usize,
    },
    /// A frame was encoded for sending.
    FrameEncoded {
        packet_type: PacketType,
        frame_len: usize,
    },
    /// A complete frame was discarded; decoding continues after it.
    FrameDropped {
        frame_len: usize,
        error: &'a ProtocolError,
    },
    /// Buffered bytes were discarded because framing could not be trusted.
    BufferDiscarded {
        discarded: usize,
        error: &'a ProtocolError,
    },
    /// No registered handler acted on a packet.
    Unhandled { packet_type: PacketType },
    /// A handler returned an error. Other handlers still ran.
    HandlerFailed {
        handler: &'static str,
        packet_type: PacketType,
        error: &'a ProtocolError,
    },
    AuthSucceeded { username: &'a str },
    AuthFailed { username: &'a str, reason: &'a str },
    SaltIssued { username: &'a str },
    Registered { username: &'a str },
    RegistrationRejected { username: &'a str, reason: &'a str },
    ConnectionOpened { connection_id: u64 },
    ConnectionClosed { connection_id: u64 },
}

/// Sink for diagnostic events.
pub trait Diagnostics: Send + Sync {
    fn emit(&self, event: DiagnosticEvent<'_>);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl TracingDiagnostics {
    pub fn shared() -> Arc<dyn Diagnostics> {
        Arc::new(Self)
    }
}

impl Diagnostics for TracingDiagnostics {
    fn emit(&self, event: DiagnosticEvent<'_>) {
        match event {
            DiagnosticEvent::FrameDecoded {
                packet_type,
                frame_len,
            } => debug!(packet_type = packet_type.name(), frame_len, "Frame decoded"),
            DiagnosticEvent::FrameEncoded {
                packet_type,
                frame_len,
            } => debug!(packet_type = packet_type.name(), frame_len, "Frame encoded"),
            DiagnosticEvent::FrameDropped { frame_len, error } => {
                warn!(frame_len, error = %error, "Dropped frame")
            }
            DiagnosticEvent::BufferDiscarded { discarded, error } => {
                warn!(discarded, error = %error, "Discarded receive buffer")
            }
            DiagnosticEvent::Unhandled { packet_type } => {
                warn!(packet_type = packet_type.name(), "Packet not handled by any handler")
            }
            DiagnosticEvent::HandlerFailed {
                handler,
                packet_type,
                error,
            } => warn!(handler, packet_type = packet_type.name(), error = %error, "Handler failed"),
            DiagnosticEvent::AuthSucceeded { username } => {
                info!(username, "Authentication succeeded")
            }
            DiagnosticEvent::AuthFailed { username, reason } => {
                warn!(username, reason, "Authentication failed")
            }
            DiagnosticEvent::SaltIssued { username } => debug!(username, "Salt issued"),
            DiagnosticEvent::Registered { username } => info!(username, "User registered"),
            DiagnosticEvent::RegistrationRejected { username, reason } => {
                warn!(username, reason, "Registration rejected")
            }
            DiagnosticEvent::ConnectionOpened { connection_id } => {
                info!(connection_id, "Connection opened")
            }
            DiagnosticEvent::ConnectionClosed { connection_id } => {
                info!(connection_id, "Connection closed")
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {
    fn emit(&self, _event: DiagnosticEvent<'_>) {}
}
