//! Local embedded store backed by SQLite.
//!
//! [`Database`] exposes synchronous typed helpers per collection;
//! [`LocalStore`] serialises access to it behind a mutex and implements
//! [`ChatStore`].

mod conversations;
mod database;
mod emojis;
pub mod migrations;
mod stories;
mod users;

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

pub use database::Database;

use crate::error::{Result, StoreError};
use crate::models::{Conversation, CustomEmoji, Message, Reaction, Story, User};
use crate::store::ChatStore;

/// [`ChatStore`] over a local SQLite file.
pub struct LocalStore {
    db: Mutex<Database>,
}

impl LocalStore {
    /// Open the database in the platform data directory.
    pub fn open_default() -> Result<Self> {
        Ok(Self::from_database(Database::new()?))
    }

    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        tracing::info!(path = %path.display(), "opening local store");
        Ok(Self::from_database(Database::open_at(path)?))
    }

    pub fn from_database(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let guard = self.db.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&guard)
    }
}

#[async_trait]
impl ChatStore for LocalStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn get_user(&self, id: Uuid) -> Result<User> {
        self.with_db(|db| db.get_user(id))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User> {
        self.with_db(|db| db.get_user_by_username(username))
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.with_db(|db| db.list_users())
    }

    async fn put_user(&self, user: &User) -> Result<()> {
        self.with_db(|db| db.put_user(user))
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Conversation> {
        self.with_db(|db| db.get_conversation(id))
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        self.with_db(|db| db.list_conversations())
    }

    async fn put_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.with_db(|db| db.put_conversation(conversation))
    }

    async fn append_message(&self, conversation_id: Uuid, message: &Message) -> Result<Conversation> {
        self.with_db(|db| db.append_message(conversation_id, message))
    }

    async fn add_reaction(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        reaction: &Reaction,
    ) -> Result<Conversation> {
        self.with_db(|db| db.add_reaction(conversation_id, message_id, reaction))
    }

    async fn edit_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        new_text: &str,
    ) -> Result<Conversation> {
        self.with_db(|db| db.edit_message(conversation_id, message_id, new_text))
    }

    async fn delete_message(&self, conversation_id: Uuid, message_id: Uuid) -> Result<Conversation> {
        self.with_db(|db| db.delete_message(conversation_id, message_id))
    }

    async fn mark_read(&self, conversation_id: Uuid) -> Result<Conversation> {
        self.with_db(|db| db.mark_read(conversation_id))
    }

    async fn list_custom_emojis(&self, user_id: Uuid) -> Result<Vec<CustomEmoji>> {
        self.with_db(|db| db.list_custom_emojis(user_id))
    }

    async fn put_custom_emoji(&self, emoji: &CustomEmoji) -> Result<()> {
        self.with_db(|db| db.put_custom_emoji(emoji))
    }

    async fn delete_custom_emoji(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_db(|db| db.delete_custom_emoji(id, user_id))
    }

    async fn list_stories(&self) -> Result<Vec<Story>> {
        self.with_db(|db| db.list_stories())
    }

    async fn put_story(&self, story: &Story) -> Result<()> {
        self.with_db(|db| db.put_story(story))
    }

    async fn update_story_viewers(&self, id: Uuid, viewers: &[Uuid]) -> Result<()> {
        self.with_db(|db| db.update_story_viewers(id, viewers))
    }

    async fn delete_story(&self, id: Uuid) -> Result<bool> {
        self.with_db(|db| db.delete_story(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_trait_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(&dir.path().join("nested").join("parley.db")).unwrap();
        assert_eq!(store.backend(), "local");

        let alice = User::new("Alice".into(), "alice".into(), None, String::new());
        store.put_user(&alice).await.unwrap();
        assert_eq!(store.get_user_by_username("alice").await.unwrap().id, alice.id);

        let bob = Uuid::new_v4();
        let conv = Conversation::new(alice.id, bob);
        store.put_conversation(&conv).await.unwrap();

        let msg = Message::text(alice.id, "hi", None);
        let after = store.append_message(conv.id, &msg).await.unwrap();
        assert_eq!(after.unread_count, 1);

        let after = store.mark_read(conv.id).await.unwrap();
        assert_eq!(after.unread_count, 0);
        assert_eq!(store.list_conversations().await.unwrap(), vec![after]);
    }
}
