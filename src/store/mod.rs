//! # Stores
//!
//! The user and chat stores are shared by every connection. The protocol
//! core only talks to them through [`UserStore`] and [`ChatStore`];
//! [`memory`] has the in-process implementations used by the server binary
//! and the tests.

pub mod memory;

use crate::core::packet::Message;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// What is kept per registered user. The plaintext password never is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub password_hash: String,
    pub salt: String,
    pub first_name: String,
    pub last_name: String,
}

pub trait UserStore: Send + Sync {
    fn user_exists(&self, username: &str) -> Result<bool>;

    /// Insert a user unless the name is taken. Returns `false` if it was.
    ///
    /// The existence check and the insert must be atomic: of two concurrent
    /// calls for the same name at most one returns `true`.
    fn create_user(
        &self,
        username: &str,
        first_name: &str,
        last_name: &str,
        password_hash: &str,
        salt: &str,
    ) -> Result<bool>;

    fn get_user_record(&self, username: &str) -> Result<Option<UserRecord>>;
}

pub trait ChatStore: Send + Sync {
    /// Chat names in ascending order.
    fn list_chat_names(&self) -> Result<Vec<String>>;

    fn chat_exists(&self, chat_name: &str) -> Result<bool>;

    /// Append to `message.chat_name`. Returns `false` if no such chat exists.
    fn append_message(&self, message: &Message) -> Result<bool>;

    /// Returns `false` if the chat already existed.
    fn create_chat(&self, chat_name: &str) -> Result<bool>;

    /// Returns `false` if there was no such chat.
    fn delete_chat(&self, chat_name: &str) -> Result<bool>;

    /// History of a chat, oldest first.
    fn messages(&self, chat_name: &str) -> Result<Option<Vec<Message>>>;
}
