use rusqlite::params;
use uuid::Uuid;

use crate::error::Result;
use crate::models::CustomEmoji;

use super::Database;

impl Database {
    pub fn put_custom_emoji(&self, emoji: &CustomEmoji) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO custom_emojis (id, user_id, created_at, record)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                emoji.id.to_string(),
                emoji.user_id.to_string(),
                emoji.created_at.to_rfc3339(),
                serde_json::to_string(emoji)?,
            ],
        )?;
        Ok(())
    }

    pub fn list_custom_emojis(&self, user_id: Uuid) -> Result<Vec<CustomEmoji>> {
        self.query_records(
            "SELECT record FROM custom_emojis WHERE user_id = ?1 ORDER BY created_at ASC",
            params![user_id.to_string()],
        )
    }

    // owner check lives in the WHERE clause
    pub fn delete_custom_emoji(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM custom_emojis WHERE id = ?1 AND user_id = ?2",
            params![id.to_string(), user_id.to_string()],
        )?;
        Ok(affected > 0)
    }
}
