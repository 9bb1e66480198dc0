//! Conversation records and the derived message operations.
//!
//! Every derived operation is fetch whole record -> transform in memory ->
//! write whole record.  There is no version check between the read and the
//! write.

use rusqlite::params;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Conversation, Message, Reaction};

use super::Database;

impl Database {
    /// Insert or replace a conversation by id.
    pub fn put_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO conversations (id, last_message_time, record)
             VALUES (?1, ?2, ?3)",
            params![
                conversation.id.to_string(),
                conversation.last_message_time.to_rfc3339(),
                serde_json::to_string(conversation)?,
            ],
        )?;
        Ok(())
    }

    pub fn get_conversation(&self, id: Uuid) -> Result<Conversation> {
        self.query_record(
            "SELECT record FROM conversations WHERE id = ?1",
            params![id.to_string()],
        )
    }

    pub fn list_conversations(&self) -> Result<Vec<Conversation>> {
        self.query_records("SELECT record FROM conversations", [])
    }

    /// Read-modify-write helper behind the derived operations.
    fn modify_conversation<F>(&self, id: Uuid, f: F) -> Result<Conversation>
    where
        F: FnOnce(&mut Conversation) -> Result<()>,
    {
        let mut conversation = self.get_conversation(id)?;
        f(&mut conversation)?;
        self.put_conversation(&conversation)?;
        Ok(conversation)
    }

    pub fn append_message(&self, conversation_id: Uuid, message: &Message) -> Result<Conversation> {
        self.modify_conversation(conversation_id, |c| {
            c.append_message(message.clone());
            Ok(())
        })
    }

    pub fn add_reaction(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        reaction: &Reaction,
    ) -> Result<Conversation> {
        self.modify_conversation(conversation_id, |c| {
            c.add_reaction(message_id, reaction.clone()).map(|_| ())
        })
    }

    pub fn edit_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        new_text: &str,
    ) -> Result<Conversation> {
        self.modify_conversation(conversation_id, |c| {
            c.edit_message(message_id, new_text).map(|_| ())
        })
    }

    pub fn delete_message(&self, conversation_id: Uuid, message_id: Uuid) -> Result<Conversation> {
        self.modify_conversation(conversation_id, |c| {
            c.soft_delete_message(message_id).map(|_| ())
        })
    }

    pub fn mark_read(&self, conversation_id: Uuid) -> Result<Conversation> {
        self.modify_conversation(conversation_id, |c| {
            c.mark_read();
            Ok(())
        })
    }
}
