//! Per-connection protocol state.
//!
//! A [`ConnectionSession`] is owned by whatever owns the connection and is
//! dropped with it, so no buffer or login progress survives a reconnect.
//! [`SessionRegistry`] is the keyed form for event-driven servers that see
//! `(connection, chunk)` pairs.

use crate::core::codec::PacketCodec;
use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::{Dispatcher, HandlerContext, Outbox};
use crate::protocol::reassembler::FrameAssembler;
use crate::utils::diagnostics::DiagnosticEvent;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::warn;

pub type ConnectionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPhase {
    #[default]
    Unauthenticated,
    SaltIssued,
    Authenticated,
}

/// Login progress of one connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSession {
    phase: AuthPhase,
    pending_username: Option<String>,
    authenticated_user: Option<String>,
}

impl AuthSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> AuthPhase {
        self.phase
    }

    pub fn pending_username(&self) -> Option<&str> {
        self.pending_username.as_deref()
    }

    /// The user this connection logged in as, once `Authenticated`.
    pub fn authenticated_user(&self) -> Option<&str> {
        self.authenticated_user.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase == AuthPhase::Authenticated
    }

    /// Salt was sent for `username`; wait for its hash.
    pub fn salt_issued(&mut self, username: impl Into<String>) {
        self.phase = AuthPhase::SaltIssued;
        self.pending_username = Some(username.into());
        self.authenticated_user = None;
    }

    /// The hash matched. Returns the username that was pending.
    pub fn authenticate(&mut self) -> Option<String> {
        let username = self.pending_username.take()?;
        self.phase = AuthPhase::Authenticated;
        self.authenticated_user = Some(username.clone());
        Some(username)
    }

    /// Back to `Unauthenticated`, forgetting any pending username.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Receive buffer plus login state for one live connection.
#[derive(Debug)]
pub struct ConnectionSession {
    id: ConnectionId,
    receive_buffer: FrameAssembler,
    auth: AuthSession,
    dispatch_failures: u64,
}

impl ConnectionSession {
    pub fn new(id: ConnectionId, codec: PacketCodec) -> Self {
        Self {
            id,
            receive_buffer: FrameAssembler::new(codec),
            auth: AuthSession::new(),
            dispatch_failures: 0,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    pub fn buffered(&self) -> usize {
        self.receive_buffer.buffered()
    }

    /// Reassemble `chunk` into complete packets.
    pub fn on_bytes_received(&mut self, chunk: &[u8]) -> Vec<Packet> {
        self.receive_buffer.push(chunk)
    }

    /// Dispatch one packet against this session's state.
    pub fn handle(&mut self, packet: &Packet, dispatcher: &Dispatcher) -> Result<Outbox> {
        let mut outbox = Outbox::default();
        let mut ctx = HandlerContext::new(self.id, &mut self.auth, &mut outbox);
        dispatcher.dispatch(packet, &mut ctx)?;
        Ok(outbox)
    }

    /// Reassemble `chunk` and dispatch every completed packet in arrival
    /// order, collecting what the handlers want sent.
    ///
    /// A packet the dispatcher fails on is logged and counted in
    /// [`dispatch_failures`](Self::dispatch_failures). The packets around it
    /// are still dispatched and their output kept.
    pub fn process(&mut self, chunk: &[u8], dispatcher: &Dispatcher) -> Outbox {
        let mut outbox = Outbox::default();
        for packet in self.on_bytes_received(chunk) {
            match self.handle(&packet, dispatcher) {
                Ok(produced) => outbox.extend(produced),
                Err(error) => {
                    self.dispatch_failures += 1;
                    warn!(
                        connection_id = self.id,
                        packet_type = packet.packet_type().name(),
                        error = %error,
                        "Dispatch failed"
                    );
                }
            }
        }
        outbox
    }

    pub fn dispatch_failures(&self) -> u64 {
        self.dispatch_failures
    }

    /// End of stream. Fails if a partial frame was still buffered.
    pub fn finish(&mut self) -> Result<()> {
        self.receive_buffer.finish()
    }
}

/// Sessions keyed by connection id.
#[derive(Debug)]
pub struct SessionRegistry {
    codec: PacketCodec,
    sessions: HashMap<ConnectionId, ConnectionSession>,
}

impl SessionRegistry {
    pub fn new(codec: PacketCodec) -> Self {
        Self {
            codec,
            sessions: HashMap::new(),
        }
    }

    /// Start a fresh session. An existing session with the same id is
    /// replaced, never resumed.
    pub fn open(&mut self, id: ConnectionId) -> &mut ConnectionSession {
        self.codec
            .diagnostics()
            .emit(DiagnosticEvent::ConnectionOpened { connection_id: id });
        let session = ConnectionSession::new(id, self.codec.clone());
        match self.sessions.entry(id) {
            Entry::Occupied(mut slot) => {
                slot.insert(session);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(session),
        }
    }

    /// Drop the session's buffer and login state.
    pub fn close(&mut self, id: ConnectionId) -> Option<ConnectionSession> {
        let session = self.sessions.remove(&id);
        if session.is_some() {
            self.codec
                .diagnostics()
                .emit(DiagnosticEvent::ConnectionClosed { connection_id: id });
        }
        session
    }

    pub fn get(&self, id: ConnectionId) -> Option<&ConnectionSession> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut ConnectionSession> {
        self.sessions.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Feed a chunk received on connection `id`.
    pub fn on_bytes_received(&mut self, id: ConnectionId, chunk: &[u8]) -> Result<Vec<Packet>> {
        self.sessions
            .get_mut(&id)
            .map(|session| session.on_bytes_received(chunk))
            .ok_or(ProtocolError::UnknownConnection(id))
    }
}
