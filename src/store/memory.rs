use crate::core::packet::Message;
use crate::error::{constants, ProtocolError, Result};
use crate::store::{ChatStore, UserRecord, UserStore};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

fn poisoned() -> ProtocolError {
    ProtocolError::StoreError(constants::ERR_STORE_LOCK_POISONED.to_string())
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| poisoned())
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| poisoned())
}

#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<BTreeMap<String, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UserStore for InMemoryUserStore {
    fn user_exists(&self, username: &str) -> Result<bool> {
        Ok(read(&self.users)?.contains_key(username))
    }

    fn create_user(
        &self,
        username: &str,
        first_name: &str,
        last_name: &str,
        password_hash: &str,
        salt: &str,
    ) -> Result<bool> {
        let mut users = write(&self.users)?;
        match users.entry(username.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(UserRecord {
                    password_hash: password_hash.to_string(),
                    salt: salt.to_string(),
                    first_name: first_name.to_string(),
                    last_name: last_name.to_string(),
                });
                Ok(true)
            }
        }
    }

    fn get_user_record(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(read(&self.users)?.get(username).cloned())
    }
}

/// Chats keyed by name, so listing comes out sorted.
#[derive(Debug, Default)]
pub struct InMemoryChatStore {
    chats: RwLock<BTreeMap<String, Vec<Message>>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with empty chats.
    pub fn with_chats<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let chats = names.into_iter().map(|n| (n.into(), Vec::new())).collect();
        Self {
            chats: RwLock::new(chats),
        }
    }
}

impl ChatStore for InMemoryChatStore {
    fn list_chat_names(&self) -> Result<Vec<String>> {
        Ok(read(&self.chats)?.keys().cloned().collect())
    }

    fn chat_exists(&self, chat_name: &str) -> Result<bool> {
        Ok(read(&self.chats)?.contains_key(chat_name))
    }

    fn append_message(&self, message: &Message) -> Result<bool> {
        let mut chats = write(&self.chats)?;
        match chats.get_mut(&message.chat_name) {
            Some(history) => {
                history.push(message.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn create_chat(&self, chat_name: &str) -> Result<bool> {
        let mut chats = write(&self.chats)?;
        match chats.entry(chat_name.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(Vec::new());
                Ok(true)
            }
        }
    }

    fn delete_chat(&self, chat_name: &str) -> Result<bool> {
        Ok(write(&self.chats)?.remove(chat_name).is_some())
    }

    fn messages(&self, chat_name: &str) -> Result<Option<Vec<Message>>> {
        Ok(read(&self.chats)?.get(chat_name).cloned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_create_user_once() {
        let store = InMemoryUserStore::new();
        assert!(store.create_user("bob", "B", "C", "h", "s").unwrap());
        assert!(!store.create_user("bob", "X", "Y", "h2", "s2").unwrap());

        let record = store.get_user_record("bob").unwrap().unwrap();
        assert_eq!(record.first_name, "B");
        assert_eq!(record.salt, "s");
        assert!(store.user_exists("bob").unwrap());
        assert!(store.get_user_record("alice").unwrap().is_none());
    }

    #[test]
    fn test_concurrent_registration_single_winner() {
        let store = Arc::new(InMemoryUserStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .create_user("carol", "C", "D", &format!("h{i}"), "s")
                        .unwrap()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|created| *created)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_chat_lifecycle() {
        let store = InMemoryChatStore::with_chats(["zeta", "alpha"]);
        assert_eq!(store.list_chat_names().unwrap(), vec!["alpha", "zeta"]);

        assert!(!store.chat_exists("mid").unwrap());
        assert!(store.create_chat("mid").unwrap());
        assert!(!store.create_chat("mid").unwrap());
        assert!(store.chat_exists("mid").unwrap());

        let message = Message {
            chat_name: "mid".into(),
            text: "hi".into(),
            ..Message::default()
        };
        assert!(store.append_message(&message).unwrap());
        assert_eq!(store.messages("mid").unwrap().unwrap(), vec![message.clone()]);

        assert!(store.delete_chat("mid").unwrap());
        assert!(!store.chat_exists("mid").unwrap());
        assert!(!store.append_message(&message).unwrap());
        assert!(store.messages("mid").unwrap().is_none());
    }
}
