use crate::core::packet::{Auth, ChatList, Message, Packet, PacketType, Register, ServerResponse};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::session::{AuthSession, ConnectionId};
use crate::utils::diagnostics::{DiagnosticEvent, Diagnostics};
use std::sync::{Arc, RwLock};

/// Whether a handler acted on a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handling {
    Handled,
    Ignored,
}

/// Packets produced while handling one inbound packet.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Outbox {
    /// Sent back to the connection the packet came from.
    pub replies: Vec<Packet>,
    /// Sent to every open connection, the originating one included.
    pub broadcasts: Vec<Packet>,
}

impl Outbox {
    pub fn reply(&mut self, packet: impl Into<Packet>) {
        self.replies.push(packet.into());
    }

    pub fn broadcast(&mut self, packet: impl Into<Packet>) {
        self.broadcasts.push(packet.into());
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty() && self.broadcasts.is_empty()
    }

    pub fn extend(&mut self, other: Outbox) {
        self.replies.extend(other.replies);
        self.broadcasts.extend(other.broadcasts);
    }
}

/// Per-packet view of the connection handed to each handler.
#[derive(Debug)]
pub struct HandlerContext<'a> {
    pub connection_id: ConnectionId,
    pub auth: &'a mut AuthSession,
    pub outbox: &'a mut Outbox,
}

impl<'a> HandlerContext<'a> {
    pub fn new(connection_id: ConnectionId, auth: &'a mut AuthSession, outbox: &'a mut Outbox) -> Self {
        Self {
            connection_id,
            auth,
            outbox,
        }
    }
}

/// Visitor over the packet variants.
///
/// Every method defaults to [`Handling::Ignored`]; a handler overrides the
/// ones for the variants it cares about.
pub trait PacketHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_register(&self, _ctx: &mut HandlerContext<'_>, _packet: &Register) -> Result<Handling> {
        Ok(Handling::Ignored)
    }

    fn on_auth(&self, _ctx: &mut HandlerContext<'_>, _packet: &Auth) -> Result<Handling> {
        Ok(Handling::Ignored)
    }

    fn on_message(&self, _ctx: &mut HandlerContext<'_>, _packet: &Message) -> Result<Handling> {
        Ok(Handling::Ignored)
    }

    fn on_server_response(
        &self,
        _ctx: &mut HandlerContext<'_>,
        _packet: &ServerResponse,
    ) -> Result<Handling> {
        Ok(Handling::Ignored)
    }

    fn on_chat_list(&self, _ctx: &mut HandlerContext<'_>, _packet: &ChatList) -> Result<Handling> {
        Ok(Handling::Ignored)
    }
}

/// Outcome of dispatching one packet.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub handled: usize,
    pub failures: Vec<(&'static str, ProtocolError)>,
}

impl DispatchReport {
    /// No handler acted on the packet and none failed.
    pub fn is_unhandled(&self) -> bool {
        self.handled == 0 && self.failures.is_empty()
    }
}

/// Routes each packet to every registered handler.
pub struct Dispatcher {
    handlers: Arc<RwLock<Vec<Arc<dyn PacketHandler>>>>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl Dispatcher {
    pub fn new(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
            diagnostics,
        }
    }

    /// Register a handler. The same instance cannot be registered twice.
    pub fn register(&self, handler: Arc<dyn PacketHandler>) -> Result<()> {
        let mut handlers = self.handlers.write().map_err(|_| {
            ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string())
        })?;

        if handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            return Err(ProtocolError::Custom(format!(
                "{}: {}",
                constants::ERR_DUPLICATE_HANDLER,
                handler.name()
            )));
        }

        tracing::debug!(handler = handler.name(), "Handler registered");
        handlers.push(handler);
        Ok(())
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().map(|h| h.len()).unwrap_or(0)
    }

    /// Offer `packet` to every handler in registration order.
    ///
    /// A failing handler does not stop the others; its error is recorded in
    /// the report.
    pub fn dispatch(&self, packet: &Packet, ctx: &mut HandlerContext<'_>) -> Result<DispatchReport> {
        let handlers: Vec<Arc<dyn PacketHandler>> = self
            .handlers
            .read()
            .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_READ_LOCK.to_string()))?
            .clone();

        let packet_type: PacketType = packet.packet_type();
        let mut report = DispatchReport::default();

        for handler in &handlers {
            match packet.accept(handler.as_ref(), ctx) {
                Ok(Handling::Handled) => report.handled += 1,
                Ok(Handling::Ignored) => {}
                Err(error) => {
                    self.diagnostics.emit(DiagnosticEvent::HandlerFailed {
                        handler: handler.name(),
                        packet_type,
                        error: &error,
                    });
                    report.failures.push((handler.name(), error));
                }
            }
        }

        if report.is_unhandled() {
            self.diagnostics
                .emit(DiagnosticEvent::Unhandled { packet_type });
        }
        Ok(report)
    }
}
