//! The signed-in user's custom emoji library.

use std::sync::Arc;

use parley_shared::attachment::{validate_emoji_media, DataUri};
use parley_shared::constants::{MAX_CUSTOM_EMOJI_NAME_LEN, MAX_CUSTOM_EMOJI_SIZE};
use parley_shared::ValidationError;
use parley_store::{ChatStore, CustomEmoji, User};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::events::Notifier;

pub struct EmojiLibrary {
    store: Arc<dyn ChatStore>,
    notifier: Notifier,
    session: watch::Receiver<Option<User>>,
    emojis: Vec<CustomEmoji>,
}

fn check_name(name: &str) -> Result<&str> {
    let name = name.trim().trim_matches(':');
    if name.is_empty() {
        return Err(ValidationError::EmptyField("emoji name").into());
    }
    let valid = name.chars().count() <= MAX_CUSTOM_EMOJI_NAME_LEN
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(ValidationError::InvalidValue {
            field: "emoji name",
            value: name.to_string(),
        }
        .into());
    }
    Ok(name)
}

impl EmojiLibrary {
    pub fn new(store: Arc<dyn ChatStore>, notifier: Notifier, session: watch::Receiver<Option<User>>) -> Self {
        Self {
            store,
            notifier,
            session,
            emojis: Vec::new(),
        }
    }

    fn me(&self) -> Result<Uuid> {
        self.session
            .borrow()
            .as_ref()
            .map(|u| u.id)
            .ok_or(ClientError::NotSignedIn)
    }

    /// Oldest first.
    pub fn emojis(&self) -> &[CustomEmoji] {
        &self.emojis
    }

    pub fn find(&self, id: Uuid) -> Option<&CustomEmoji> {
        self.emojis.iter().find(|e| e.id == id)
    }

    pub async fn load(&mut self) -> Result<()> {
        let result = self.try_load().await;
        self.notifier.report("load_custom_emojis", result)
    }

    async fn try_load(&mut self) -> Result<()> {
        let me = self.me()?;
        self.emojis = self.store.list_custom_emojis(me).await?;
        Ok(())
    }

    /// Encode `media` as a data URI and add it to the library.
    pub async fn upload(&mut self, name: &str, media: Vec<u8>, mime: &str) -> Result<CustomEmoji> {
        let result = self.try_upload(name, media, mime).await;
        self.notifier.report("upload_custom_emoji", result)
    }

    async fn try_upload(&mut self, name: &str, media: Vec<u8>, mime: &str) -> Result<CustomEmoji> {
        let me = self.me()?;
        let name = check_name(name)?;
        validate_emoji_media(mime, media.len(), MAX_CUSTOM_EMOJI_SIZE)?;
        if self.emojis.iter().any(|e| e.name == name) {
            return Err(ValidationError::InvalidValue {
                field: "emoji name",
                value: format!("'{name}' is already in your library"),
            }
            .into());
        }

        let emoji = CustomEmoji::new(me, name.to_string(), DataUri::new(mime, media).encode());
        self.store.put_custom_emoji(&emoji).await?;
        info!(emoji_id = %emoji.id, name = %emoji.name, "Custom emoji uploaded");

        self.emojis.push(emoji.clone());
        Ok(emoji)
    }

    /// Only the owner can delete.
    pub async fn delete(&mut self, id: Uuid) -> Result<()> {
        let result = self.try_delete(id).await;
        self.notifier.report("delete_custom_emoji", result)
    }

    async fn try_delete(&mut self, id: Uuid) -> Result<()> {
        let me = self.me()?;
        if !self.store.delete_custom_emoji(id, me).await? {
            return Err(ClientError::NotFound("custom emoji"));
        }
        info!(emoji_id = %id, "Custom emoji deleted");
        self.emojis.retain(|e| e.id != id);
        Ok(())
    }

    /// Take back an upload whose follow-up failed.  Best effort: if the
    /// store refuses, the record stays listed so the library matches it.
    pub(crate) async fn roll_back_upload(&mut self, emoji: &CustomEmoji) {
        match self.store.delete_custom_emoji(emoji.id, emoji.user_id).await {
            Ok(_) => self.emojis.retain(|e| e.id != emoji.id),
            Err(e) => warn!(emoji_id = %emoji.id, error = %e, "Failed to roll back emoji upload"),
        }
    }

    /// Put back a deleted record, keeping the library oldest first.
    pub(crate) async fn roll_back_delete(&mut self, emoji: CustomEmoji) {
        if let Err(e) = self.store.put_custom_emoji(&emoji).await {
            warn!(emoji_id = %emoji.id, error = %e, "Failed to roll back emoji delete");
            return;
        }
        let pos = self.emojis.partition_point(|e| e.created_at <= emoji.created_at);
        self.emojis.insert(pos, emoji);
    }

    pub fn reset(&mut self) {
        self.emojis.clear();
    }
}

#[cfg(test)]
mod tests {
    use parley_store::LocalStore;

    use super::*;

    fn library(dir: &tempfile::TempDir, user: User) -> (watch::Sender<Option<User>>, EmojiLibrary) {
        let store = LocalStore::open(&dir.path().join("e.db")).unwrap();
        let (tx, rx) = watch::channel(Some(user));
        (tx, EmojiLibrary::new(Arc::new(store), Notifier::new(), rx))
    }

    #[tokio::test]
    async fn test_upload_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let alice = User::new("Alice".into(), "alice".into(), None, String::new());
        let (_tx, mut lib) = library(&dir, alice);

        let emoji = lib.upload(":party:", vec![1, 2, 3], "image/gif").await.unwrap();
        assert_eq!(emoji.name, "party");
        assert_eq!(DataUri::parse(&emoji.media).unwrap().bytes, vec![1, 2, 3]);

        lib.reset();
        lib.load().await.unwrap();
        assert_eq!(lib.find(emoji.id), Some(&emoji));
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let dir = tempfile::tempdir().unwrap();
        let alice = User::new("Alice".into(), "alice".into(), None, String::new());
        let (_tx, mut lib) = library(&dir, alice);

        assert!(lib.upload("doc", vec![1], "application/pdf").await.is_err());
        assert!(lib.upload("huge", vec![0; MAX_CUSTOM_EMOJI_SIZE + 1], "image/png").await.is_err());
        assert!(lib.upload("two words", vec![1], "image/png").await.is_err());
        lib.upload("wave", vec![1], "video/webm").await.unwrap();
        assert!(lib.upload("wave", vec![1], "image/png").await.is_err());
        assert_eq!(lib.emojis().len(), 1);
    }

    #[tokio::test]
    async fn test_only_owner_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let alice = User::new("Alice".into(), "alice".into(), None, String::new());
        let (tx, mut lib) = library(&dir, alice.clone());
        let emoji = lib.upload("mine", vec![9], "image/png").await.unwrap();

        tx.send_replace(Some(User::new("Mallory".into(), "mallory".into(), None, String::new())));
        assert!(matches!(
            lib.delete(emoji.id).await,
            Err(ClientError::NotFound("custom emoji"))
        ));

        tx.send_replace(Some(alice));
        lib.delete(emoji.id).await.unwrap();
        assert!(lib.emojis().is_empty());
    }
}
