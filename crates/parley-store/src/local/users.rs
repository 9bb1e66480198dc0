//! CRUD operations for [`User`] records.

use rusqlite::params;
use uuid::Uuid;

use crate::error::Result;
use crate::models::User;

use super::Database;

impl Database {
    /// Insert or replace a user by id.
    pub fn put_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO users (id, username, record) VALUES (?1, ?2, ?3)",
            params![user.id.to_string(), user.username, serde_json::to_string(user)?],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.query_record("SELECT record FROM users WHERE id = ?1", params![id.to_string()])
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<User> {
        self.query_record(
            "SELECT record FROM users WHERE username = ?1 LIMIT 1",
            params![username],
        )
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.query_records("SELECT record FROM users ORDER BY username ASC", [])
    }
}
