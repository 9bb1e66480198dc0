//! v001 -- Initial schema creation.
//!
//! Creates the three record collections: `users`, `conversations` and
//! `custom_emojis`.  Each row holds the whole record as JSON in `record`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id       TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    username TEXT NOT NULL,               -- uniqueness checked by the caller
    record   TEXT NOT NULL                -- JSON
);

CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);

-- ----------------------------------------------------------------
-- Conversations (messages and reactions embedded in the record)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversations (
    id                TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    last_message_time TEXT NOT NULL,              -- RFC-3339
    record            TEXT NOT NULL               -- JSON
);

CREATE INDEX IF NOT EXISTS idx_conversations_last_message_time
    ON conversations(last_message_time);

-- ----------------------------------------------------------------
-- Custom emojis
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS custom_emojis (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    user_id    TEXT NOT NULL,               -- owner
    created_at TEXT NOT NULL,               -- RFC-3339
    record     TEXT NOT NULL                -- JSON
);

CREATE INDEX IF NOT EXISTS idx_custom_emojis_user ON custom_emojis(user_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
