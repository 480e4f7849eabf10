use crate::core::packet::{ChatList, Message};
use crate::error::Result;
use crate::protocol::dispatcher::{HandlerContext, Handling, PacketHandler};
use crate::store::{ChatStore, UserStore};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

pub const UNKNOWN_FIRST_NAME: &str = "Unknown";
pub const UNKNOWN_LAST_NAME: &str = "User";

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Chat messages and chat listing.
pub struct ChatService {
    users: Arc<dyn UserStore>,
    chats: Arc<dyn ChatStore>,
}

impl ChatService {
    pub fn new(users: Arc<dyn UserStore>, chats: Arc<dyn ChatStore>) -> Self {
        Self { users, chats }
    }

    /// Fill in the sender's display name and the server time.
    fn enrich(&self, message: &Message) -> Message {
        let (first_name, last_name) = match self.users.get_user_record(&message.from) {
            Ok(Some(record)) => (record.first_name, record.last_name),
            Ok(None) => (UNKNOWN_FIRST_NAME.to_string(), UNKNOWN_LAST_NAME.to_string()),
            Err(error) => {
                warn!(from = %message.from, error = %error, "Sender lookup failed");
                (UNKNOWN_FIRST_NAME.to_string(), UNKNOWN_LAST_NAME.to_string())
            }
        };

        Message {
            first_name,
            last_name,
            from: message.from.clone(),
            text: message.text.clone(),
            chat_name: message.chat_name.clone(),
            timestamp: now_millis(),
        }
    }
}

impl PacketHandler for ChatService {
    fn name(&self) -> &'static str {
        "chat"
    }

    fn on_message(&self, ctx: &mut HandlerContext<'_>, packet: &Message) -> Result<Handling> {
        if !self.chats.chat_exists(&packet.chat_name)? {
            debug!(chat = %packet.chat_name, "Message for unknown chat dropped");
            return Ok(Handling::Handled);
        }

        let message = self.enrich(packet);
        // The chat can be deleted between the check and the append.
        if !self.chats.append_message(&message)? {
            debug!(chat = %message.chat_name, "Message for unknown chat dropped");
            return Ok(Handling::Handled);
        }
        ctx.outbox.broadcast(message);
        Ok(Handling::Handled)
    }

    fn on_chat_list(&self, ctx: &mut HandlerContext<'_>, _packet: &ChatList) -> Result<Handling> {
        let chat_names = self.chats.list_chat_names()?;
        ctx.outbox.reply(ChatList { chat_names });
        Ok(Handling::Handled)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::packet::Packet;
    use crate::protocol::dispatcher::Outbox;
    use crate::protocol::session::AuthSession;
    use crate::store::memory::{InMemoryChatStore, InMemoryUserStore};

    fn setup() -> (ChatService, Arc<InMemoryChatStore>) {
        let users = Arc::new(InMemoryUserStore::new());
        users.create_user("alice", "Alice", "Liddell", "h", "s").unwrap();
        let chats = Arc::new(InMemoryChatStore::with_chats(["general", "random"]));
        let service = ChatService::new(users, chats.clone());
        (service, chats)
    }

    fn message(from: &str, chat: &str) -> Message {
        Message {
            from: from.into(),
            text: "hello".into(),
            chat_name: chat.into(),
            timestamp: 1,
            ..Message::default()
        }
    }

    fn run(service: &ChatService, packet: Packet) -> Outbox {
        let mut auth = AuthSession::new();
        let mut outbox = Outbox::default();
        let mut ctx = HandlerContext::new(3, &mut auth, &mut outbox);
        packet.accept(service, &mut ctx).unwrap();
        outbox
    }

    #[test]
    fn test_message_enriched_and_broadcast() {
        let (service, chats) = setup();
        let before = now_millis();
        let outbox = run(&service, message("alice", "general").into());

        assert!(outbox.replies.is_empty());
        let Some(Packet::Message(sent)) = outbox.broadcasts.first() else {
            panic!("expected a broadcast message");
        };
        assert_eq!(sent.first_name, "Alice");
        assert_eq!(sent.last_name, "Liddell");
        assert!(sent.timestamp >= before);
        assert_eq!(chats.messages("general").unwrap().unwrap(), vec![sent.clone()]);
    }

    #[test]
    fn test_unknown_sender_gets_placeholder_name() {
        let (service, _) = setup();
        let outbox = run(&service, message("ghost", "random").into());
        let Some(Packet::Message(sent)) = outbox.broadcasts.first() else {
            panic!("expected a broadcast message");
        };
        assert_eq!((sent.first_name.as_str(), sent.last_name.as_str()), ("Unknown", "User"));
    }

    #[test]
    fn test_unknown_chat_dropped() {
        let (service, chats) = setup();
        let outbox = run(&service, message("alice", "nowhere").into());
        assert!(outbox.is_empty());
        assert!(chats.messages("nowhere").unwrap().is_none());
    }

    #[test]
    fn test_chat_list_reply_sorted() {
        let (service, chats) = setup();
        chats.create_chat("admins").unwrap();
        let outbox = run(&service, ChatList::default().into());
        assert_eq!(
            outbox.replies,
            vec![Packet::ChatList(ChatList {
                chat_names: vec!["admins".into(), "general".into(), "random".into()]
            })]
        );
    }
}
