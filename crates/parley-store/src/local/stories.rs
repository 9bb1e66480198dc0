use rusqlite::params;
use uuid::Uuid;

use crate::error::Result;
use crate::models::Story;

use super::Database;

impl Database {
    pub fn put_story(&self, story: &Story) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO stories (id, user_id, expires_at, record)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                story.id.to_string(),
                story.user_id.to_string(),
                story.expires_at.to_rfc3339(),
                serde_json::to_string(story)?,
            ],
        )?;
        Ok(())
    }

    pub fn get_story(&self, id: Uuid) -> Result<Story> {
        self.query_record("SELECT record FROM stories WHERE id = ?1", params![id.to_string()])
    }

    /// Expired stories are returned too; nothing purges them.
    pub fn list_stories(&self) -> Result<Vec<Story>> {
        self.query_records("SELECT record FROM stories", [])
    }

    pub fn update_story_viewers(&self, id: Uuid, viewers: &[Uuid]) -> Result<()> {
        let mut story = self.get_story(id)?;
        story.viewers = viewers.to_vec();
        self.put_story(&story)
    }

    pub fn delete_story(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM stories WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}
