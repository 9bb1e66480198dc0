//! In-memory record transforms shared by both store implementations.
//!
//! The local store applies these to a whole fetched record and writes it back;
//! the remote store applies them to a reassembled conversation to learn which
//! rows changed, then writes only those rows.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use parley_shared::constants::DELETED_MESSAGE_PLACEHOLDER;

use crate::error::{Result, StoreError};
use crate::models::{Conversation, Message, Reaction, Story};

/// Text shown in the conversation summary for `message`.
pub fn summary_text(message: &Message) -> String {
    if message.deleted {
        DELETED_MESSAGE_PLACEHOLDER.to_string()
    } else if message.text.trim().is_empty() {
        message.kind.summary_label().to_string()
    } else {
        message.text.clone()
    }
}

impl Conversation {
    /// Whether both users take part in this conversation.
    pub fn has_participants(&self, a: Uuid, b: Uuid) -> bool {
        self.participants.contains(&a) && self.participants.contains(&b)
    }

    /// The participant that is not `me`, if any.
    pub fn other_participant(&self, me: Uuid) -> Option<Uuid> {
        self.participants.iter().copied().find(|p| *p != me)
    }

    pub fn find_message(&self, message_id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    fn message_mut(&mut self, message_id: Uuid) -> Result<&mut Message> {
        self.messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or(StoreError::MessageNotFound(message_id))
    }

    /// Recompute `last_message_text` / `last_message_time` from the newest
    /// message.  An empty conversation keeps its creation-time summary.
    pub fn refresh_summary(&mut self) {
        if let Some(last) = self.messages.last() {
            self.last_message_text = Some(summary_text(last));
            self.last_message_time = last.timestamp;
        }
    }

    /// Insert `message` in timestamp order, bump the unread counter and
    /// refresh the summary.
    pub fn append_message(&mut self, message: Message) {
        let pos = self
            .messages
            .partition_point(|m| m.timestamp <= message.timestamp);
        self.messages.insert(pos, message);
        self.unread_count = self.unread_count.saturating_add(1);
        self.refresh_summary();
    }

    /// Append `reaction` to the target message.  Repeated identical reactions
    /// are not merged.
    pub fn add_reaction(&mut self, message_id: Uuid, reaction: Reaction) -> Result<&Message> {
        let message = self.message_mut(message_id)?;
        message.reactions.push(reaction);
        Ok(&*message)
    }

    /// Replace the message text and set `edited`.  No history is kept.
    /// Deleted messages are not protected.
    pub fn edit_message(&mut self, message_id: Uuid, new_text: &str) -> Result<&Message> {
        {
            let message = self.message_mut(message_id)?;
            message.text = new_text.to_string();
            message.edited = true;
        }
        self.refresh_summary();
        self.message_mut(message_id).map(|m| &*m)
    }

    /// Soft delete: placeholder text, attachment cleared, `deleted` set.  The
    /// message keeps its slot and its reactions.
    pub fn soft_delete_message(&mut self, message_id: Uuid) -> Result<&Message> {
        {
            let message = self.message_mut(message_id)?;
            message.text = DELETED_MESSAGE_PLACEHOLDER.to_string();
            message.attachment = None;
            message.deleted = true;
        }
        self.refresh_summary();
        self.message_mut(message_id).map(|m| &*m)
    }

    /// Zero the conversation-level unread counter.  Per-message `read` flags
    /// are left as they are.
    pub fn mark_read(&mut self) {
        self.unread_count = 0;
    }
}

impl Story {
    /// Visible while `now < expires_at`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Record a viewer once.  Returns `true` if the viewer was new.
    pub fn add_viewer(&mut self, viewer: Uuid) -> bool {
        if self.viewers.contains(&viewer) {
            return false;
        }
        self.viewers.push(viewer);
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use parley_shared::types::{MessageKind, StoryKind};

    use super::*;
    use crate::models::Attachment;

    fn pair() -> (Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn test_append_updates_summary() {
        let (alice, bob) = pair();
        let mut conv = Conversation::new(alice, bob);

        let msg = Message::text(alice, "hi", None);
        let ts = msg.timestamp;
        conv.append_message(msg);

        assert_eq!(conv.messages.len(), 1);
        assert_eq!(conv.last_message_text.as_deref(), Some("hi"));
        assert_eq!(conv.last_message_time, ts);
        assert_eq!(conv.unread_count, 1);
    }

    #[test]
    fn test_append_keeps_timestamp_order() {
        let (alice, bob) = pair();
        let mut conv = Conversation::new(alice, bob);

        let later = Message::text(alice, "second", None);
        let mut earlier = Message::text(bob, "first", None);
        earlier.timestamp = later.timestamp - Duration::seconds(5);

        conv.append_message(later.clone());
        conv.append_message(earlier);

        assert_eq!(conv.messages[0].text, "first");
        assert_eq!(conv.messages[1].text, "second");
        assert_eq!(conv.last_message_text.as_deref(), Some("second"));
        assert_eq!(conv.last_message_time, later.timestamp);
    }

    #[test]
    fn test_attachment_summary_label() {
        let (alice, bob) = pair();
        let mut conv = Conversation::new(alice, bob);
        let attachment = Attachment {
            data_uri: "data:audio/webm;base64,AAAA".into(),
            name: None,
            size: Some(3),
            mime_type: Some("audio/webm".into()),
            duration_secs: Some(1.5),
        };
        conv.append_message(Message::with_attachment(alice, MessageKind::Voice, attachment, ""));
        assert_eq!(conv.last_message_text.as_deref(), Some("Voice message"));
    }

    #[test]
    fn test_duplicate_reactions_are_kept() {
        let (alice, bob) = pair();
        let mut conv = Conversation::new(alice, bob);
        let msg = Message::text(alice, "hi", None);
        let id = msg.id;
        conv.append_message(msg);

        let thumbs = Reaction {
            emoji: "👍".into(),
            user_id: bob,
            is_custom: false,
            custom_emoji_id: None,
        };
        conv.add_reaction(id, thumbs.clone()).unwrap();
        let msg = conv.add_reaction(id, thumbs.clone()).unwrap();

        assert_eq!(msg.reactions, vec![thumbs.clone(), thumbs]);
    }

    #[test]
    fn test_reaction_on_missing_message() {
        let (alice, bob) = pair();
        let mut conv = Conversation::new(alice, bob);
        let missing = Uuid::new_v4();
        let err = conv
            .add_reaction(
                missing,
                Reaction {
                    emoji: "🎉".into(),
                    user_id: bob,
                    is_custom: false,
                    custom_emoji_id: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::MessageNotFound(id) if id == missing));
    }

    #[test]
    fn test_edit_sets_flag_and_summary() {
        let (alice, bob) = pair();
        let mut conv = Conversation::new(alice, bob);
        let msg = Message::text(alice, "helo", None);
        let id = msg.id;
        conv.append_message(msg);

        let edited = conv.edit_message(id, "hello").unwrap();
        assert!(edited.edited);
        assert_eq!(edited.text, "hello");
        assert_eq!(conv.last_message_text.as_deref(), Some("hello"));
    }

    #[test]
    fn test_soft_delete_keeps_slot_and_reactions() {
        let (alice, bob) = pair();
        let mut conv = Conversation::new(alice, bob);
        let attachment = Attachment {
            data_uri: "data:image/png;base64,AAAA".into(),
            name: Some("a.png".into()),
            size: Some(3),
            mime_type: Some("image/png".into()),
            duration_secs: None,
        };
        let msg = Message::with_attachment(alice, MessageKind::Image, attachment, "look");
        let id = msg.id;
        conv.append_message(msg);
        conv.append_message(Message::text(bob, "nice", None));
        conv.add_reaction(
            id,
            Reaction {
                emoji: "❤️".into(),
                user_id: bob,
                is_custom: false,
                custom_emoji_id: None,
            },
        )
        .unwrap();

        let deleted = conv.soft_delete_message(id).unwrap();
        assert!(deleted.deleted);
        assert_eq!(deleted.text, DELETED_MESSAGE_PLACEHOLDER);
        assert!(deleted.attachment.is_none());
        assert_eq!(deleted.reactions.len(), 1);
        assert_eq!(conv.messages.len(), 2);
        // Not the newest message, so the summary still shows the reply.
        assert_eq!(conv.last_message_text.as_deref(), Some("nice"));
    }

    #[test]
    fn test_mark_read_leaves_message_flags() {
        let (alice, bob) = pair();
        let mut conv = Conversation::new(alice, bob);
        conv.append_message(Message::text(alice, "a", None));
        conv.append_message(Message::text(alice, "b", None));
        assert_eq!(conv.unread_count, 2);

        conv.mark_read();
        assert_eq!(conv.unread_count, 0);
        assert!(conv.messages.iter().all(|m| !m.read));
    }

    #[test]
    fn test_story_window_and_viewers() {
        let t = Utc::now();
        let viewer = Uuid::new_v4();
        let mut story = Story::new(Uuid::new_v4(), StoryKind::Image, "data:".into(), None, t);

        assert!(story.is_active_at(t));
        assert!(story.is_active_at(t + Duration::hours(24) - Duration::milliseconds(1)));
        assert!(!story.is_active_at(t + Duration::hours(24)));

        assert!(story.add_viewer(viewer));
        assert!(!story.add_viewer(viewer));
        assert_eq!(story.viewers, vec![viewer]);
    }
}
