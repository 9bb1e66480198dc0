//! Remote store over a hosted relational backend.
//!
//! Conversations are normalized into four tables and reassembled on every
//! read.  Derived operations fetch the assembled conversation, apply the
//! shared mutation helper in memory, write only the rows that changed plus
//! the summary row, then fetch again.  Those writes are separate requests:
//! if one fails after another succeeded the summary row is stale until the
//! next mutation recomputes it from the message rows.

mod rest;
pub mod rows;

#[cfg(test)]
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub use rest::{Filter, Order, PostgrestClient, RestClient};

use crate::error::{Result, StoreError};
use crate::models::{Conversation, CustomEmoji, Message, Reaction, Story, User};
use crate::store::ChatStore;
use rows::{
    assemble_conversations, participant_rows, ConversationRow, CustomEmojiRow, MessageRow,
    ParticipantRow, ReactionRow, StoryRow, UserRow, CONVERSATIONS, CUSTOM_EMOJIS, MESSAGES,
    PARTICIPANTS, REACTIONS, STORIES, USERS,
};

/// Ids per `in.(...)` filter.  Keeps request URLs a few kilobytes long no
/// matter how much history a conversation carries.
const IN_FILTER_CHUNK: usize = 100;

/// [`ChatStore`] backed by a [`RestClient`].
#[derive(Clone)]
pub struct RemoteStore {
    client: Arc<dyn RestClient>,
}

impl RemoteStore {
    pub fn new(client: impl RestClient + 'static) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn from_shared(client: Arc<dyn RestClient>) -> Self {
        Self { client }
    }

    /// Connect to a PostgREST endpoint.  No request is made until the first
    /// operation.
    pub fn connect(base_url: &str, api_key: &str) -> Result<Self> {
        tracing::info!(%base_url, "using remote store");
        Ok(Self::new(PostgrestClient::new(base_url, api_key)?))
    }

    async fn select<T: DeserializeOwned + Send>(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<Order>,
    ) -> Result<Vec<T>> {
        // `in.()` is not valid PostgREST syntax, and matches nothing anyway
        if filters.iter().any(|f| matches!(f, Filter::In(_, v) if v.is_empty())) {
            return Ok(Vec::new());
        }
        self.client
            .select(table, filters, order)
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(StoreError::from))
            .collect()
    }

    /// `select` with `column in ids`, split across requests of
    /// [`IN_FILTER_CHUNK`] ids.  Rows sharing one id land in the same chunk,
    /// so `order` still holds within each group.
    async fn select_in<T: DeserializeOwned + Send>(
        &self,
        table: &str,
        column: &'static str,
        ids: &[Uuid],
        order: Option<Order>,
    ) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        for chunk in ids.chunks(IN_FILTER_CHUNK) {
            rows.extend(self.select(table, &[Filter::is_in(column, chunk)], order).await?);
        }
        Ok(rows)
    }

    async fn delete_in(&self, table: &str, column: &'static str, ids: &[Uuid]) -> Result<usize> {
        let mut deleted = 0;
        for chunk in ids.chunks(IN_FILTER_CHUNK) {
            deleted += self.client.delete(table, &[Filter::is_in(column, chunk)]).await?;
        }
        Ok(deleted)
    }

    async fn insert_rows<T: Serialize + Sync>(&self, table: &str, rows: &[T]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.client.insert(table, serde_json::to_value(rows)?).await
    }

    async fn upsert_row<T: Serialize + Sync>(&self, table: &str, row: &T) -> Result<()> {
        self.client.upsert(table, serde_json::to_value(row)?).await
    }

    async fn fetch_conversations(&self, filters: &[Filter]) -> Result<Vec<Conversation>> {
        let conversations: Vec<ConversationRow> = self.select(CONVERSATIONS, filters, None).await?;
        let ids: Vec<Uuid> = conversations.iter().map(|c| c.id).collect();

        let participants: Vec<ParticipantRow> = self
            .select_in(PARTICIPANTS, "conversation_id", &ids, None)
            .await?;
        let messages: Vec<MessageRow> = self
            .select_in(MESSAGES, "conversation_id", &ids, Some(Order::asc("created_at")))
            .await?;
        let message_ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();
        let reactions: Vec<ReactionRow> = self
            .select_in(REACTIONS, "message_id", &message_ids, Some(Order::asc("created_at")))
            .await?;

        assemble_conversations(conversations, participants, messages, reactions)
    }

    async fn write_summary(&self, conversation: &Conversation) -> Result<()> {
        let row = ConversationRow::from(conversation);
        let patch = json!({
            "last_message_text": row.last_message_text,
            "last_message_time": row.last_message_time,
            "unread_count": row.unread_count,
        });
        let updated = self
            .client
            .update(CONVERSATIONS, &[Filter::eq("id", conversation.id)], patch)
            .await?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_message(&self, conversation_id: Uuid, message: &Message) -> Result<()> {
        let row = MessageRow::new(conversation_id, message);
        let mut patch = serde_json::to_value(&row)?;
        if let Value::Object(fields) = &mut patch {
            fields.remove("id");
            fields.remove("conversation_id");
        }
        self.client
            .update(MESSAGES, &[Filter::eq("id", message.id)], patch)
            .await?;
        Ok(())
    }
}

fn updated_message(conversation: &Conversation, message_id: Uuid) -> Result<&Message> {
    conversation
        .find_message(message_id)
        .ok_or(StoreError::MessageNotFound(message_id))
}

#[async_trait]
impl ChatStore for RemoteStore {
    fn backend(&self) -> &'static str {
        "remote"
    }

    async fn get_user(&self, id: Uuid) -> Result<User> {
        let rows: Vec<UserRow> = self.select(USERS, &[Filter::eq("id", id)], None).await?;
        rows.into_iter().next().ok_or(StoreError::NotFound)?.into_user()
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User> {
        let rows: Vec<UserRow> = self
            .select(USERS, &[Filter::eq("username", username)], None)
            .await?;
        rows.into_iter().next().ok_or(StoreError::NotFound)?.into_user()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = self.select(USERS, &[], Some(Order::asc("username"))).await?;
        rows.into_iter().map(UserRow::into_user).collect()
    }

    async fn put_user(&self, user: &User) -> Result<()> {
        self.upsert_row(USERS, &UserRow::from(user)).await
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Conversation> {
        self.fetch_conversations(&[Filter::eq("id", id)])
            .await?
            .into_iter()
            .next()
            .ok_or(StoreError::NotFound)
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        self.fetch_conversations(&[]).await
    }

    /// Replaces every row belonging to the conversation.
    async fn put_conversation(&self, conversation: &Conversation) -> Result<()> {
        let id = conversation.id;
        self.upsert_row(CONVERSATIONS, &ConversationRow::from(conversation))
            .await?;

        self.client
            .delete(PARTICIPANTS, &[Filter::eq("conversation_id", id)])
            .await?;
        self.insert_rows(PARTICIPANTS, &participant_rows(conversation))
            .await?;

        let old: Vec<MessageRow> = self
            .select(MESSAGES, &[Filter::eq("conversation_id", id)], None)
            .await?;
        if !old.is_empty() {
            let old_ids: Vec<Uuid> = old.iter().map(|m| m.id).collect();
            self.delete_in(REACTIONS, "message_id", &old_ids).await?;
            self.client
                .delete(MESSAGES, &[Filter::eq("conversation_id", id)])
                .await?;
        }

        let messages: Vec<MessageRow> = conversation
            .messages
            .iter()
            .map(|m| MessageRow::new(id, m))
            .collect();
        let reactions: Vec<ReactionRow> = conversation
            .messages
            .iter()
            .flat_map(|m| m.reactions.iter().map(|r| ReactionRow::new(m.id, r)))
            .collect();
        self.insert_rows(MESSAGES, &messages).await?;
        self.insert_rows(REACTIONS, &reactions).await
    }

    async fn append_message(&self, conversation_id: Uuid, message: &Message) -> Result<Conversation> {
        let mut conversation = self.get_conversation(conversation_id).await?;
        conversation.append_message(message.clone());
        tracing::debug!(%conversation_id, message_id = %message.id, "appending message row");

        self.insert_rows(MESSAGES, &[MessageRow::new(conversation_id, message)])
            .await?;
        let reactions: Vec<ReactionRow> = message
            .reactions
            .iter()
            .map(|r| ReactionRow::new(message.id, r))
            .collect();
        self.insert_rows(REACTIONS, &reactions).await?;
        self.write_summary(&conversation).await?;

        self.get_conversation(conversation_id).await
    }

    async fn add_reaction(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        reaction: &Reaction,
    ) -> Result<Conversation> {
        let mut conversation = self.get_conversation(conversation_id).await?;
        conversation.add_reaction(message_id, reaction.clone())?;

        self.insert_rows(REACTIONS, &[ReactionRow::new(message_id, reaction)])
            .await?;

        self.get_conversation(conversation_id).await
    }

    async fn edit_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        new_text: &str,
    ) -> Result<Conversation> {
        let mut conversation = self.get_conversation(conversation_id).await?;
        conversation.edit_message(message_id, new_text)?;

        self.update_message(conversation_id, updated_message(&conversation, message_id)?)
            .await?;
        self.write_summary(&conversation).await?;

        self.get_conversation(conversation_id).await
    }

    async fn delete_message(&self, conversation_id: Uuid, message_id: Uuid) -> Result<Conversation> {
        let mut conversation = self.get_conversation(conversation_id).await?;
        conversation.soft_delete_message(message_id)?;

        self.update_message(conversation_id, updated_message(&conversation, message_id)?)
            .await?;
        self.write_summary(&conversation).await?;

        self.get_conversation(conversation_id).await
    }

    async fn mark_read(&self, conversation_id: Uuid) -> Result<Conversation> {
        let updated = self
            .client
            .update(
                CONVERSATIONS,
                &[Filter::eq("id", conversation_id)],
                json!({ "unread_count": 0 }),
            )
            .await?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_conversation(conversation_id).await
    }

    async fn list_custom_emojis(&self, user_id: Uuid) -> Result<Vec<CustomEmoji>> {
        let rows: Vec<CustomEmojiRow> = self
            .select(
                CUSTOM_EMOJIS,
                &[Filter::eq("user_id", user_id)],
                Some(Order::asc("created_at")),
            )
            .await?;
        rows.into_iter().map(CustomEmojiRow::into_emoji).collect()
    }

    async fn put_custom_emoji(&self, emoji: &CustomEmoji) -> Result<()> {
        self.upsert_row(CUSTOM_EMOJIS, &CustomEmojiRow::from(emoji)).await
    }

    async fn delete_custom_emoji(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let deleted = self
            .client
            .delete(
                CUSTOM_EMOJIS,
                &[Filter::eq("id", id), Filter::eq("user_id", user_id)],
            )
            .await?;
        Ok(deleted > 0)
    }

    async fn list_stories(&self) -> Result<Vec<Story>> {
        let rows: Vec<StoryRow> = self
            .select(STORIES, &[], Some(Order::asc("created_at")))
            .await?;
        rows.into_iter().map(StoryRow::into_story).collect()
    }

    async fn put_story(&self, story: &Story) -> Result<()> {
        self.upsert_row(STORIES, &StoryRow::from(story)).await
    }

    async fn update_story_viewers(&self, id: Uuid, viewers: &[Uuid]) -> Result<()> {
        let updated = self
            .client
            .update(STORIES, &[Filter::eq("id", id)], json!({ "viewers": viewers }))
            .await?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_story(&self, id: Uuid) -> Result<bool> {
        let deleted = self.client.delete(STORIES, &[Filter::eq("id", id)]).await?;
        Ok(deleted > 0)
    }
}
