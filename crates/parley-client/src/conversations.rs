//! Conversation list, the open conversation and every message mutation.
//!
//! Each mutation goes through the store's derived operation and then
//! reloads the whole list, so every view sees the state the store holds.

use std::sync::Arc;

use parley_shared::attachment::{validate_attachment, DataUri};
use parley_shared::constants::MAX_MESSAGE_LEN;
use parley_shared::{MessageKind, ValidationError};
use parley_store::{Attachment, ChatStore, Conversation, Message, Reaction, User};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::events::{AppEvent, Notifier};

/// A non-text message whose payload is already encoded as a data URI.
#[derive(Debug, Clone)]
pub struct AttachmentDraft {
    pub kind: MessageKind,
    pub data_uri: String,
    pub file_name: Option<String>,
    /// Voice messages only.
    pub duration_secs: Option<f64>,
    pub caption: String,
}

pub struct Conversations {
    store: Arc<dyn ChatStore>,
    notifier: Notifier,
    session: watch::Receiver<Option<User>>,
    list: Vec<Conversation>,
    active: Option<Uuid>,
    max_attachment_bytes: usize,
}

fn check_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyField("message").into());
    }
    let len = text.chars().count();
    if len > MAX_MESSAGE_LEN {
        return Err(ValidationError::MessageTooLong {
            len,
            max: MAX_MESSAGE_LEN,
        }
        .into());
    }
    Ok(())
}

impl Conversations {
    pub fn new(
        store: Arc<dyn ChatStore>,
        notifier: Notifier,
        session: watch::Receiver<Option<User>>,
        max_attachment_bytes: usize,
    ) -> Self {
        Self {
            store,
            notifier,
            session,
            list: Vec::new(),
            active: None,
            max_attachment_bytes,
        }
    }

    /// Newest activity first.
    pub fn conversations(&self) -> &[Conversation] {
        &self.list
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        let id = self.active?;
        self.list.iter().find(|c| c.id == id)
    }

    /// The conversation between the signed-in user and `user_id`.
    pub fn conversation_with(&self, user_id: Uuid) -> Option<&Conversation> {
        let me = self.session.borrow().as_ref().map(|u| u.id)?;
        self.list.iter().find(|c| c.has_participants(me, user_id))
    }

    pub fn select_conversation(&mut self, id: Uuid) -> Result<&Conversation> {
        if !self.list.iter().any(|c| c.id == id) {
            return self
                .notifier
                .report("select_conversation", Err(ClientError::NotFound("conversation")));
        }
        self.active = Some(id);
        self.active_conversation()
            .ok_or(ClientError::NotFound("conversation"))
    }

    /// Drop all in-memory state (on sign-out).
    pub fn reset(&mut self) {
        self.list.clear();
        self.active = None;
        self.notifier.emit(AppEvent::ConversationsChanged);
    }

    fn me(&self) -> Result<Uuid> {
        self.session
            .borrow()
            .as_ref()
            .map(|u| u.id)
            .ok_or(ClientError::NotSignedIn)
    }

    fn active_id(&self) -> Result<Uuid> {
        self.active_conversation()
            .map(|c| c.id)
            .ok_or(ClientError::NoActiveConversation)
    }

    pub async fn load_conversations(&mut self) -> Result<()> {
        let result = self.reload().await;
        self.notifier.report("load_conversations", result)
    }

    async fn reload(&mut self) -> Result<()> {
        let mut list = self.store.list_conversations().await?;
        list.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
        debug!(count = list.len(), "Conversations loaded");

        self.list = list;
        if let Some(id) = self.active {
            if !self.list.iter().any(|c| c.id == id) {
                self.active = None;
            }
        }
        self.notifier.emit(AppEvent::ConversationsChanged);
        Ok(())
    }

    /// Open the conversation with `other_user_id`, creating it if the pair
    /// has none yet.
    pub async fn start_new_conversation(&mut self, other_user_id: Uuid) -> Result<Conversation> {
        let result = self.try_start(other_user_id).await;
        self.notifier.report("start_new_conversation", result)
    }

    async fn try_start(&mut self, other_user_id: Uuid) -> Result<Conversation> {
        let me = self.me()?;
        if other_user_id == me {
            return Err(ValidationError::InvalidValue {
                field: "participant",
                value: other_user_id.to_string(),
            }
            .into());
        }

        if let Some(existing) = self
            .list
            .iter()
            .find(|c| c.has_participants(me, other_user_id))
        {
            self.active = Some(existing.id);
            return Ok(existing.clone());
        }

        self.store
            .get_user(other_user_id)
            .await
            .map_err(ClientError::absent("user"))?;

        let conversation = Conversation::new(me, other_user_id);
        self.store.put_conversation(&conversation).await?;
        info!(conversation_id = %conversation.id, other = %other_user_id, "Conversation created");

        self.list.insert(0, conversation.clone());
        self.active = Some(conversation.id);
        self.notifier.emit(AppEvent::ConversationsChanged);
        Ok(conversation)
    }

    pub async fn send_message(&mut self, text: &str, reply_to: Option<Uuid>) -> Result<Message> {
        let result = self.try_send(text, reply_to).await;
        self.notifier.report("send_message", result)
    }

    async fn try_send(&mut self, text: &str, reply_to: Option<Uuid>) -> Result<Message> {
        let me = self.me()?;
        let conversation_id = self.active_id()?;
        check_text(text)?;
        if let Some(target) = reply_to {
            let known = self
                .active_conversation()
                .is_some_and(|c| c.find_message(target).is_some());
            if !known {
                return Err(ValidationError::InvalidValue {
                    field: "reply_to",
                    value: target.to_string(),
                }
                .into());
            }
        }

        let message = Message::text(me, text, reply_to);
        self.append(conversation_id, message).await
    }

    pub async fn send_attachment_message(&mut self, draft: AttachmentDraft) -> Result<Message> {
        let result = self.try_send_attachment(draft).await;
        self.notifier.report("send_attachment_message", result)
    }

    async fn try_send_attachment(&mut self, draft: AttachmentDraft) -> Result<Message> {
        let me = self.me()?;
        let conversation_id = self.active_id()?;

        let payload = DataUri::parse(&draft.data_uri)?;
        validate_attachment(draft.kind, &payload.mime, payload.len(), self.max_attachment_bytes)?;
        let caption_len = draft.caption.chars().count();
        if caption_len > MAX_MESSAGE_LEN {
            return Err(ValidationError::MessageTooLong {
                len: caption_len,
                max: MAX_MESSAGE_LEN,
            }
            .into());
        }

        let attachment = Attachment {
            data_uri: draft.data_uri,
            name: draft.file_name,
            size: Some(payload.len() as u64),
            mime_type: Some(payload.mime),
            duration_secs: draft.duration_secs.filter(|_| draft.kind == MessageKind::Voice),
        };
        let message = Message::with_attachment(me, draft.kind, attachment, draft.caption);
        self.append(conversation_id, message).await
    }

    async fn append(&mut self, conversation_id: Uuid, message: Message) -> Result<Message> {
        self.store.append_message(conversation_id, &message).await?;
        info!(%conversation_id, message_id = %message.id, kind = %message.kind, "Message sent");
        self.reload().await?;
        Ok(message)
    }

    /// React to a message in the open conversation.  A custom emoji reaction
    /// carries the emoji's id; repeated identical reactions are all kept.
    pub async fn add_reaction(
        &mut self,
        message_id: Uuid,
        emoji: &str,
        custom_emoji_id: Option<Uuid>,
    ) -> Result<()> {
        let result = self.try_react(message_id, emoji, custom_emoji_id).await;
        self.notifier.report("add_reaction", result)
    }

    async fn try_react(&mut self, message_id: Uuid, emoji: &str, custom_emoji_id: Option<Uuid>) -> Result<()> {
        let me = self.me()?;
        let conversation_id = self.active_id()?;
        if emoji.trim().is_empty() {
            return Err(ValidationError::EmptyField("emoji").into());
        }

        let reaction = Reaction {
            emoji: emoji.to_string(),
            user_id: me,
            is_custom: custom_emoji_id.is_some(),
            custom_emoji_id,
        };
        self.store
            .add_reaction(conversation_id, message_id, &reaction)
            .await
            .map_err(ClientError::absent("message"))?;
        debug!(%conversation_id, %message_id, emoji, "Reaction added");
        self.reload().await
    }

    pub async fn edit_message(&mut self, message_id: Uuid, new_text: &str) -> Result<()> {
        let result = self.try_edit(message_id, new_text).await;
        self.notifier.report("edit_message", result)
    }

    async fn try_edit(&mut self, message_id: Uuid, new_text: &str) -> Result<()> {
        self.me()?;
        let conversation_id = self.active_id()?;
        check_text(new_text)?;

        self.store
            .edit_message(conversation_id, message_id, new_text)
            .await
            .map_err(ClientError::absent("message"))?;
        info!(%conversation_id, %message_id, "Message edited");
        self.reload().await
    }

    pub async fn delete_message(&mut self, message_id: Uuid) -> Result<()> {
        let result = self.try_delete(message_id).await;
        self.notifier.report("delete_message", result)
    }

    async fn try_delete(&mut self, message_id: Uuid) -> Result<()> {
        self.me()?;
        let conversation_id = self.active_id()?;

        self.store
            .delete_message(conversation_id, message_id)
            .await
            .map_err(ClientError::absent("message"))?;
        info!(%conversation_id, %message_id, "Message deleted");
        self.reload().await
    }

    /// Zero the unread counter.  Per-message `read` flags are left alone.
    pub async fn mark_as_read(&mut self, conversation_id: Uuid) -> Result<()> {
        let result = self.try_mark_read(conversation_id).await;
        self.notifier.report("mark_as_read", result)
    }

    async fn try_mark_read(&mut self, conversation_id: Uuid) -> Result<()> {
        self.store
            .mark_read(conversation_id)
            .await
            .map_err(ClientError::absent("conversation"))?;
        self.reload().await
    }
}
