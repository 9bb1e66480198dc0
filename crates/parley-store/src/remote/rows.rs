//! Row shapes of the remote tables and their mapping to domain records.
//!
//! Timestamps travel as RFC 3339 strings and are parsed back on read.  A
//! conversation is split over `conversations`, `conversation_participants`,
//! `messages` and `reactions`; [`assemble_conversations`] puts it back
//! together.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use parley_shared::types::{MessageKind, StoryKind, UserStatus};

use crate::error::Result;
use crate::models::{Attachment, Conversation, CustomEmoji, Message, Reaction, Story, User};

pub const USERS: &str = "users";
pub const CONVERSATIONS: &str = "conversations";
pub const PARTICIPANTS: &str = "conversation_participants";
pub const MESSAGES: &str = "messages";
pub const REACTIONS: &str = "reactions";
pub const CUSTOM_EMOJIS: &str = "custom_emojis";
pub const STORIES: &str = "stories";

/// Fixed-width UTC timestamps so text order matches time order.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub credential_hash: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_seen: Option<String>,
    #[serde(default)]
    pub custom_emojis: Vec<Uuid>,
}

impl From<&User> for UserRow {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            username: user.username.clone(),
            credential_hash: user.credential_hash.clone(),
            avatar: Some(user.avatar.clone()),
            status: Some(user.status.as_str().to_string()),
            last_seen: user.last_seen.map(format_ts),
            custom_emojis: user.custom_emojis.clone(),
        }
    }
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        let status = match self.status.as_deref() {
            // unknown values fall back like a missing column
            Some(raw) => raw.parse().unwrap_or_default(),
            None => UserStatus::default(),
        };
        Ok(User {
            id: self.id,
            name: self.name,
            username: self.username,
            credential_hash: self.credential_hash,
            avatar: self.avatar.unwrap_or_default(),
            status,
            last_seen: self.last_seen.as_deref().map(parse_ts).transpose()?,
            custom_emojis: self.custom_emojis,
        })
    }
}

// ---------------------------------------------------------------------------
// conversations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationRow {
    pub id: Uuid,
    #[serde(default)]
    pub last_message_text: Option<String>,
    pub last_message_time: String,
    #[serde(default)]
    pub unread_count: u32,
}

impl From<&Conversation> for ConversationRow {
    fn from(c: &Conversation) -> Self {
        Self {
            id: c.id,
            last_message_text: c.last_message_text.clone(),
            last_message_time: format_ts(c.last_message_time),
            unread_count: c.unread_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantRow {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
}

pub fn participant_rows(c: &Conversation) -> Vec<ParticipantRow> {
    c.participants
        .iter()
        .map(|user_id| ParticipantRow {
            conversation_id: c.id,
            user_id: *user_id,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageRow {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    pub created_at: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub attachment_url: Option<String>,
    #[serde(default)]
    pub attachment_name: Option<String>,
    #[serde(default)]
    pub attachment_size: Option<u64>,
    #[serde(default)]
    pub attachment_mime: Option<String>,
    #[serde(default)]
    pub audio_duration: Option<f64>,
    #[serde(default)]
    pub reply_to_id: Option<Uuid>,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl MessageRow {
    pub fn new(conversation_id: Uuid, m: &Message) -> Self {
        let a = m.attachment.as_ref();
        Self {
            id: m.id,
            conversation_id,
            sender_id: m.sender_id,
            text: m.text.clone(),
            kind: m.kind,
            created_at: format_ts(m.timestamp),
            read: m.read,
            attachment_url: a.map(|a| a.data_uri.clone()),
            attachment_name: a.and_then(|a| a.name.clone()),
            attachment_size: a.and_then(|a| a.size),
            attachment_mime: a.and_then(|a| a.mime_type.clone()),
            audio_duration: a.and_then(|a| a.duration_secs),
            reply_to_id: m.reply_to,
            edited: m.edited,
            deleted: m.deleted,
        }
    }

    fn into_message(self, reactions: Vec<Reaction>) -> Result<Message> {
        let attachment = self.attachment_url.map(|data_uri| Attachment {
            data_uri,
            name: self.attachment_name,
            size: self.attachment_size,
            mime_type: self.attachment_mime,
            duration_secs: self.audio_duration,
        });
        Ok(Message {
            id: self.id,
            sender_id: self.sender_id,
            text: self.text,
            kind: self.kind,
            timestamp: parse_ts(&self.created_at)?,
            read: self.read,
            attachment,
            reply_to: self.reply_to_id,
            edited: self.edited,
            deleted: self.deleted,
            reactions,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReactionRow {
    pub id: Uuid,
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub emoji: String,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default)]
    pub custom_emoji_id: Option<Uuid>,
    pub created_at: String,
}

impl ReactionRow {
    pub fn new(message_id: Uuid, r: &Reaction) -> Self {
        Self {
            id: Uuid::new_v4(),
            message_id,
            user_id: r.user_id,
            emoji: r.emoji.clone(),
            is_custom: r.is_custom,
            custom_emoji_id: r.custom_emoji_id,
            created_at: format_ts(Utc::now()),
        }
    }

    fn into_reaction(self) -> Reaction {
        Reaction {
            emoji: self.emoji,
            user_id: self.user_id,
            is_custom: self.is_custom,
            custom_emoji_id: self.custom_emoji_id,
        }
    }
}

/// Rebuild whole conversations from their rows.
///
/// Messages keep the order they arrive in (callers select them by
/// `created_at`); reactions likewise.  Rows pointing at an unknown parent are
/// ignored.
pub fn assemble_conversations(
    conversations: Vec<ConversationRow>,
    participants: Vec<ParticipantRow>,
    messages: Vec<MessageRow>,
    reactions: Vec<ReactionRow>,
) -> Result<Vec<Conversation>> {
    let mut reactions_by_message: HashMap<Uuid, Vec<Reaction>> = HashMap::new();
    for row in reactions {
        reactions_by_message
            .entry(row.message_id)
            .or_default()
            .push(row.into_reaction());
    }

    let mut messages_by_conversation: HashMap<Uuid, Vec<Message>> = HashMap::new();
    for row in messages {
        let conversation_id = row.conversation_id;
        let reactions = reactions_by_message.remove(&row.id).unwrap_or_default();
        messages_by_conversation
            .entry(conversation_id)
            .or_default()
            .push(row.into_message(reactions)?);
    }

    let mut participants_by_conversation: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for row in participants {
        participants_by_conversation
            .entry(row.conversation_id)
            .or_default()
            .push(row.user_id);
    }

    conversations
        .into_iter()
        .map(|row| {
            Ok(Conversation {
                id: row.id,
                participants: participants_by_conversation.remove(&row.id).unwrap_or_default(),
                messages: messages_by_conversation.remove(&row.id).unwrap_or_default(),
                last_message_text: row.last_message_text,
                last_message_time: parse_ts(&row.last_message_time)?,
                unread_count: row.unread_count,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// custom emojis / stories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomEmojiRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub media_url: String,
    pub created_at: String,
}

impl From<&CustomEmoji> for CustomEmojiRow {
    fn from(e: &CustomEmoji) -> Self {
        Self {
            id: e.id,
            user_id: e.user_id,
            name: e.name.clone(),
            media_url: e.media.clone(),
            created_at: format_ts(e.created_at),
        }
    }
}

impl CustomEmojiRow {
    pub fn into_emoji(self) -> Result<CustomEmoji> {
        Ok(CustomEmoji {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            media: self.media_url,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: StoryKind,
    pub content: String,
    #[serde(default)]
    pub background: Option<String>,
    pub created_at: String,
    pub expires_at: String,
    #[serde(default)]
    pub viewers: Vec<Uuid>,
}

impl From<&Story> for StoryRow {
    fn from(s: &Story) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            kind: s.kind,
            content: s.content.clone(),
            background: s.background.clone(),
            created_at: format_ts(s.created_at),
            expires_at: format_ts(s.expires_at),
            viewers: s.viewers.clone(),
        }
    }
}

impl StoryRow {
    pub fn into_story(self) -> Result<Story> {
        Ok(Story {
            id: self.id,
            user_id: self.user_id,
            kind: self.kind,
            content: self.content,
            background: self.background,
            created_at: parse_ts(&self.created_at)?,
            expires_at: parse_ts(&self.expires_at)?,
            viewers: self.viewers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_groups_rows() {
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let mut conv = Conversation::new(alice, bob);
        let mut msg = Message::with_attachment(
            alice,
            MessageKind::Voice,
            Attachment {
                data_uri: "data:audio/webm;base64,AAAA".into(),
                name: None,
                size: Some(3),
                mime_type: Some("audio/webm".into()),
                duration_secs: Some(1.5),
            },
            "",
        );
        // the row format keeps microseconds only
        msg.timestamp = parse_ts(&format_ts(msg.timestamp)).unwrap();
        conv.last_message_time = msg.timestamp;
        let reaction = Reaction {
            emoji: "👍".into(),
            user_id: bob,
            is_custom: false,
            custom_emoji_id: None,
        };

        let stray = ReactionRow::new(Uuid::new_v4(), &reaction);
        let rebuilt = assemble_conversations(
            vec![ConversationRow::from(&conv)],
            participant_rows(&conv),
            vec![MessageRow::new(conv.id, &msg)],
            vec![ReactionRow::new(msg.id, &reaction), stray],
        )
        .unwrap();

        msg.reactions.push(reaction);
        conv.messages.push(msg);
        assert_eq!(rebuilt, vec![conv]);
    }

    #[test]
    fn test_user_row_defaults() {
        let row: UserRow = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "name": "Old",
            "username": "old",
            "status": "sleeping",
        }))
        .unwrap();
        let user = row.into_user().unwrap();
        assert_eq!(user.status, UserStatus::Online);
        assert_eq!(user.avatar, "");
        assert!(user.last_seen.is_none());
    }

    #[test]
    fn test_bad_timestamp_is_an_error() {
        let row = StoryRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: StoryKind::Text,
            content: "hello".into(),
            background: None,
            created_at: "yesterday".into(),
            expires_at: "tomorrow".into(),
            viewers: Vec::new(),
        };
        assert!(row.into_story().is_err());
    }
}
