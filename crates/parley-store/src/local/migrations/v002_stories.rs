use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS stories (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    user_id    TEXT NOT NULL,               -- owner
    expires_at TEXT NOT NULL,               -- RFC-3339
    record     TEXT NOT NULL                -- JSON
);

CREATE INDEX IF NOT EXISTS idx_stories_user ON stories(user_id);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
