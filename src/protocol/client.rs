//! Client side of the protocol.
//!
//! [`ClientHandler`] is registered with the client's own dispatcher. It
//! answers the server's salt with the salted hash and turns everything else
//! the server sends into [`ClientEvent`]s.

use crate::core::packet::{Auth, ChatList, Message, ResponseStatus, ResponseType, ServerResponse};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::dispatcher::{HandlerContext, Handling, PacketHandler};
use crate::utils::security::hash_password;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    AuthSucceeded,
    AuthFailed(String),
    RegisterSucceeded,
    RegisterFailed(String),
    ChatList(Vec<String>),
    Message(Message),
}

#[derive(Debug, Default)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Debug, Default)]
struct ClientState {
    login: Option<Credentials>,
    events: VecDeque<ClientEvent>,
}

#[derive(Debug, Default)]
pub struct ClientHandler {
    state: Mutex<ClientState>,
}

impl ClientHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, ClientState>> {
        self.state
            .lock()
            .map_err(|_| ProtocolError::Custom(constants::ERR_CLIENT_STATE_LOCK.to_string()))
    }

    /// Remember the credentials and return the first-round `Auth` to send.
    /// The password stays local; only its salted hash leaves the client.
    pub fn begin_login(&self, username: &str, password: &str) -> Result<Auth> {
        self.state()?.login = Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
        Ok(Auth::request_salt(username))
    }

    pub fn next_event(&self) -> Option<ClientEvent> {
        self.state().ok()?.events.pop_front()
    }

    pub fn drain_events(&self) -> Vec<ClientEvent> {
        self.state()
            .map(|mut s| s.events.drain(..).collect())
            .unwrap_or_default()
    }

    fn push(&self, event: ClientEvent) -> Result<()> {
        self.state()?.events.push_back(event);
        Ok(())
    }

    fn on_auth_response(&self, ctx: &mut HandlerContext<'_>, response: &ServerResponse) -> Result<Handling> {
        match response.status {
            ResponseStatus::SuccessWithSalt => {
                let state = self.state()?;
                let Some(login) = state.login.as_ref() else {
                    warn!("Salt received without a pending login");
                    return Ok(Handling::Ignored);
                };
                let hash = hash_password(&login.password, &response.salt);
                ctx.auth.salt_issued(login.username.as_str());
                ctx.outbox.reply(Auth::with_hash(login.username.as_str(), hash));
                debug!(username = %login.username, "Answering salt");
            }
            ResponseStatus::Success => {
                ctx.auth.authenticate();
                let mut state = self.state()?;
                state.login = None;
                state.events.push_back(ClientEvent::AuthSucceeded);
            }
            ResponseStatus::Failed => {
                ctx.auth.reset();
                let mut state = self.state()?;
                state.login = None;
                state
                    .events
                    .push_back(ClientEvent::AuthFailed(response.message.clone()));
            }
        }
        Ok(Handling::Handled)
    }
}

impl PacketHandler for ClientHandler {
    fn name(&self) -> &'static str {
        "client"
    }

    fn on_server_response(&self, ctx: &mut HandlerContext<'_>, packet: &ServerResponse) -> Result<Handling> {
        match packet.response_type {
            ResponseType::Auth => self.on_auth_response(ctx, packet),
            ResponseType::Register => {
                let event = if packet.register_succeeded() {
                    ClientEvent::RegisterSucceeded
                } else {
                    ClientEvent::RegisterFailed(packet.message.clone())
                };
                self.push(event)?;
                Ok(Handling::Handled)
            }
        }
    }

    fn on_message(&self, _ctx: &mut HandlerContext<'_>, packet: &Message) -> Result<Handling> {
        self.push(ClientEvent::Message(packet.clone()))?;
        Ok(Handling::Handled)
    }

    fn on_chat_list(&self, _ctx: &mut HandlerContext<'_>, packet: &ChatList) -> Result<Handling> {
        self.push(ClientEvent::ChatList(packet.chat_names.clone()))?;
        Ok(Handling::Handled)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::packet::Packet;
    use crate::protocol::dispatcher::Outbox;
    use crate::protocol::session::{AuthPhase, AuthSession};

    fn feed(handler: &ClientHandler, auth: &mut AuthSession, packet: Packet) -> Outbox {
        let mut outbox = Outbox::default();
        let mut ctx = HandlerContext::new(0, auth, &mut outbox);
        packet.accept(handler, &mut ctx).unwrap();
        outbox
    }

    #[test]
    fn test_login_answers_salt_with_hash() {
        let handler = ClientHandler::new();
        let mut auth = AuthSession::new();
        assert_eq!(handler.begin_login("alice", "pw1").unwrap(), Auth::request_salt("alice"));

        let outbox = feed(&handler, &mut auth, ServerResponse::auth_salt("s1").into());
        assert_eq!(
            outbox.replies,
            vec![Packet::Auth(Auth::with_hash("alice", hash_password("pw1", "s1")))]
        );
        assert_eq!(auth.phase(), AuthPhase::SaltIssued);

        feed(&handler, &mut auth, ServerResponse::auth_success().into());
        assert!(auth.is_authenticated());
        assert_eq!(handler.drain_events(), vec![ClientEvent::AuthSucceeded]);
    }

    #[test]
    fn test_salt_without_login_ignored() {
        let handler = ClientHandler::new();
        let mut auth = AuthSession::new();
        let outbox = feed(&handler, &mut auth, ServerResponse::auth_salt("s1").into());
        assert!(outbox.is_empty());
        assert!(handler.next_event().is_none());
    }

    #[test]
    fn test_events_in_arrival_order() {
        let handler = ClientHandler::new();
        let mut auth = AuthSession::new();
        feed(&handler, &mut auth, ServerResponse::register_success().into());
        feed(&handler, &mut auth, ServerResponse::register_failed("username taken").into());
        feed(&handler, &mut auth, ServerResponse::auth_failed("wrong password").into());
        feed(
            &handler,
            &mut auth,
            ChatList {
                chat_names: vec!["general".into()],
            }
            .into(),
        );

        assert_eq!(
            handler.drain_events(),
            vec![
                ClientEvent::RegisterSucceeded,
                ClientEvent::RegisterFailed("username taken".into()),
                ClientEvent::AuthFailed("wrong password".into()),
                ClientEvent::ChatList(vec!["general".into()]),
            ]
        );
    }
}
