use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error from the local store.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A lookup by id found no record.
    #[error("Record not found")]
    NotFound,

    /// The conversation exists but holds no message with this id.
    #[error("Message not found: {0}")]
    MessageNotFound(Uuid),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Record (de)serialization failure.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport failure talking to the remote backend.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote backend answered with a non-success status.
    #[error("Remote store returned {status}: {message}")]
    Remote { status: u16, message: String },

    /// Timestamp stored as text could not be parsed back.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),

    /// The connection mutex was poisoned by a panicking holder.
    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Whether this error means "the record is absent" rather than "storage
    /// failed".
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound | StoreError::MessageNotFound(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
