//! Domain records persisted by both store implementations.
//!
//! Records evolve without migrations: every field that older records may lack
//! is either an `Option` or carries `#[serde(default)]`, and is default-filled
//! when the record is read back.  The per-field notes below say what a missing
//! field turns into.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use parley_shared::constants::STORY_LIFETIME_HOURS;
use parley_shared::types::{MessageKind, StoryKind, UserStatus};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered user.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Login handle, unique across the directory.
    pub username: String,
    /// argon2 PHC string.  Missing on records created without a credential;
    /// such users cannot log in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_hash: Option<String>,
    /// Avatar reference (URL or data URI).  Missing -> empty string.
    #[serde(default)]
    pub avatar: String,
    /// Missing -> `online`.
    #[serde(default)]
    pub status: UserStatus,
    /// Missing -> `None` (never seen).
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    /// Ids of custom emoji this user owns.  Missing -> empty.
    #[serde(default)]
    pub custom_emojis: Vec<Uuid>,
}

impl User {
    pub fn new(name: String, username: String, credential_hash: Option<String>, avatar: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            username,
            credential_hash,
            avatar,
            status: UserStatus::Online,
            last_seen: Some(Utc::now()),
            custom_emojis: Vec::new(),
        }
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("credential_hash", &self.credential_hash.as_ref().map(|_| "<redacted>"))
            .field("status", &self.status)
            .field("last_seen", &self.last_seen)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// A message thread between two users, with a denormalized summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: Uuid,
    pub participants: Vec<Uuid>,
    /// Ordered by `timestamp`, oldest first.  Missing -> empty.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Summary text of the newest message.  Missing -> `None`.
    #[serde(default)]
    pub last_message_text: Option<String>,
    pub last_message_time: DateTime<Utc>,
    /// Missing -> 0.
    #[serde(default)]
    pub unread_count: u32,
}

impl Conversation {
    /// A new, empty conversation between two users.
    pub fn new(first: Uuid, second: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            participants: vec![first, second],
            messages: Vec::new(),
            last_message_text: None,
            last_message_time: Utc::now(),
            unread_count: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Payload attached to a non-text message, embedded as a data URI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub data_uri: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Voice messages only.
    #[serde(default)]
    pub duration_secs: Option<f64>,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Client-generated; no global sequence.
    pub id: Uuid,
    pub sender_id: Uuid,
    /// Missing -> empty string.
    #[serde(default)]
    pub text: String,
    /// Missing -> `text`.
    #[serde(default, rename = "type")]
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub attachment: Option<Attachment>,
    /// Id of another message in the same conversation.
    #[serde(default)]
    pub reply_to: Option<Uuid>,
    #[serde(default)]
    pub edited: bool,
    /// Soft-delete flag; the record keeps its slot.
    #[serde(default)]
    pub deleted: bool,
    /// Missing -> empty.
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

impl Message {
    /// A new unread text message timestamped now.
    pub fn text(sender_id: Uuid, text: impl Into<String>, reply_to: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id,
            text: text.into(),
            kind: MessageKind::Text,
            timestamp: Utc::now(),
            read: false,
            attachment: None,
            reply_to,
            edited: false,
            deleted: false,
            reactions: Vec::new(),
        }
    }

    /// A new unread message carrying an attachment.
    pub fn with_attachment(
        sender_id: Uuid,
        kind: MessageKind,
        attachment: Attachment,
        caption: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            attachment: Some(attachment),
            ..Self::text(sender_id, caption, None)
        }
    }
}

/// One reaction on a message.  Identical reactions from the same user are
/// kept as separate entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reaction {
    /// Emoji character(s), or the custom emoji's name when `is_custom`.
    pub emoji: String,
    pub user_id: Uuid,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default)]
    pub custom_emoji_id: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// Custom emoji
// ---------------------------------------------------------------------------

/// User-uploaded emoji (image or short video).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomEmoji {
    pub id: Uuid,
    /// Owner.
    pub user_id: Uuid,
    pub name: String,
    /// Media as a data URI.
    pub media: String,
    pub created_at: DateTime<Utc>,
}

impl CustomEmoji {
    pub fn new(user_id: Uuid, name: String, media: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name,
            media,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Story
// ---------------------------------------------------------------------------

/// A post that disappears 24 hours after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Story {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: StoryKind,
    /// Media reference or literal text.
    pub content: String,
    /// Background style, text stories only.
    #[serde(default)]
    pub background: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Grow-only.  Missing -> empty.
    #[serde(default)]
    pub viewers: Vec<Uuid>,
}

impl Story {
    /// A new story created at `now`, expiring 24 hours later.
    pub fn new(
        user_id: Uuid,
        kind: StoryKind,
        content: String,
        background: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            content,
            background,
            created_at: now,
            expires_at: now + Duration::hours(STORY_LIFETIME_HOURS),
            viewers: Vec::new(),
        }
    }
}
