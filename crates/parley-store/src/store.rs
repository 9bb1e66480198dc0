//! The storage interface shared by the local and remote backends.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Conversation, CustomEmoji, Message, Reaction, Story, User};

/// Every operation the coordinators need from persistence.
///
/// Lookups by id return [`StoreError::NotFound`](crate::StoreError::NotFound)
/// when the record is absent.  The derived conversation operations return the
/// conversation as re-read after the write.  No operation spans a transaction
/// across records, and none carries a concurrency token: concurrent writers to
/// the same conversation are last-writer-wins.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    // -- users ------------------------------------------------------------

    async fn get_user(&self, id: Uuid) -> Result<User>;

    async fn get_user_by_username(&self, username: &str) -> Result<User>;

    async fn list_users(&self) -> Result<Vec<User>>;

    /// Insert or replace by id.
    async fn put_user(&self, user: &User) -> Result<()>;

    // -- conversations ----------------------------------------------------

    async fn get_conversation(&self, id: Uuid) -> Result<Conversation>;

    /// All conversations the backend holds, unordered.
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    /// Insert or replace by id.
    async fn put_conversation(&self, conversation: &Conversation) -> Result<()>;

    /// Append a message and refresh the denormalized summary.
    async fn append_message(&self, conversation_id: Uuid, message: &Message) -> Result<Conversation>;

    async fn add_reaction(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        reaction: &Reaction,
    ) -> Result<Conversation>;

    async fn edit_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        new_text: &str,
    ) -> Result<Conversation>;

    /// Soft delete.
    async fn delete_message(&self, conversation_id: Uuid, message_id: Uuid) -> Result<Conversation>;

    async fn mark_read(&self, conversation_id: Uuid) -> Result<Conversation>;

    // -- custom emoji -----------------------------------------------------

    async fn list_custom_emojis(&self, user_id: Uuid) -> Result<Vec<CustomEmoji>>;

    async fn put_custom_emoji(&self, emoji: &CustomEmoji) -> Result<()>;

    /// Delete only if `user_id` owns it.  Returns `true` if a record was
    /// removed.
    async fn delete_custom_emoji(&self, id: Uuid, user_id: Uuid) -> Result<bool>;

    // -- stories ----------------------------------------------------------

    /// All stories, expired ones included; callers filter by time.
    async fn list_stories(&self) -> Result<Vec<Story>>;

    async fn put_story(&self, story: &Story) -> Result<()>;

    async fn update_story_viewers(&self, id: Uuid, viewers: &[Uuid]) -> Result<()>;

    async fn delete_story(&self, id: Uuid) -> Result<bool>;
}
