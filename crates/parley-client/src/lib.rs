//! # parley-client
//!
//! The coordinators behind the Parley chat UI.  [`ChatApp`] owns them and
//! the store they share; a front end drives it and renders the
//! [`AppEvent`](events::AppEvent)s it emits.
//!
//! Every coordinator operation returns a `Result` and, on failure, has
//! already logged the error and emitted a notice.  Failed operations leave
//! in-memory state as it was.

pub mod calls;
pub mod config;
pub mod conversations;
pub mod emojis;
pub mod error;
pub mod events;
pub mod identity;
pub mod session;
pub mod speech;
pub mod stories;

use std::sync::Arc;

use parley_shared::constants::DEFAULT_VOICE_ID;
use parley_shared::CallKind;
use parley_store::{ChatStore, CustomEmoji, User};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use crate::calls::{CallSession, CallState};
use crate::config::ClientConfig;
use crate::conversations::Conversations;
use crate::emojis::EmojiLibrary;
use crate::error::{ClientError, Result};
use crate::events::{AppEvent, Notifier};
use crate::identity::Identity;
use crate::session::SessionFile;
use crate::speech::SpeechClient;
use crate::stories::Stories;

/// Install the global `tracing` subscriber.  `RUST_LOG` overrides the
/// default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("parley_client=debug,parley_store=info,warn"));

    // a second call (tests, embedding) keeps the first subscriber
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Application state: the store, the event channel and every coordinator.
pub struct ChatApp {
    config: ClientConfig,
    store: Arc<dyn ChatStore>,
    notifier: Notifier,
    pub identity: Identity,
    pub conversations: Conversations,
    pub stories: Stories,
    pub emojis: EmojiLibrary,
    pub calls: CallSession,
    speech: Option<SpeechClient>,
}

impl ChatApp {
    /// Open the configured store and restore the previous session.
    pub async fn start(config: ClientConfig) -> Result<Self> {
        let store = config.open_store()?;
        Self::with_store(config, store).await
    }

    pub async fn with_store(config: ClientConfig, store: Arc<dyn ChatStore>) -> Result<Self> {
        let notifier = Notifier::new();
        let identity = Identity::new(
            store.clone(),
            notifier.clone(),
            SessionFile::new(config.session_path.clone()),
        );
        let session = identity.subscribe();

        let speech = match &config.speech_url {
            Some(url) => Some(SpeechClient::new(url, config.speech_key.as_deref(), notifier.clone())?),
            None => None,
        };

        let mut app = Self {
            conversations: Conversations::new(
                store.clone(),
                notifier.clone(),
                session.clone(),
                config.max_attachment_bytes,
            ),
            stories: Stories::new(store.clone(), notifier.clone(), session.clone()),
            emojis: EmojiLibrary::new(store.clone(), notifier.clone(), session),
            calls: CallSession::new(notifier.clone()),
            identity,
            speech,
            notifier,
            store,
            config,
        };

        info!(backend = app.store.backend(), "Starting Parley client");
        if app.identity.restore_session().await.is_some() {
            app.load_signed_in_state().await;
        }
        Ok(app)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.notifier.subscribe()
    }

    /// Load everything that belongs to the signed-in user.  Each failure has
    /// already been reported by the coordinator; the rest still loads.
    async fn load_signed_in_state(&mut self) {
        let _ = self.identity.refresh_users().await;
        let _ = self.conversations.load_conversations().await;
        let _ = self.stories.load_stories().await;
        let _ = self.emojis.load().await;
    }

    pub async fn login(&mut self, username: &str, credential: &str) -> Result<User> {
        let user = self.identity.login(username, credential).await?;
        self.load_signed_in_state().await;
        Ok(user)
    }

    pub async fn register(
        &mut self,
        name: &str,
        username: &str,
        credential: &str,
        avatar: Option<String>,
    ) -> Result<User> {
        let user = self.identity.register(name, username, credential, avatar).await?;
        self.load_signed_in_state().await;
        Ok(user)
    }

    /// Tear down everything tied to the session.
    pub async fn logout(&mut self) {
        if self.calls.is_in_call() {
            let _ = self.calls.end_call();
        }
        self.identity.logout().await;
        self.conversations.reset();
        self.stories.reset();
        self.emojis.reset();
    }

    /// Upload a custom emoji and record it on the owner's profile.  If the
    /// profile cannot be updated the upload is taken back.
    pub async fn upload_emoji(&mut self, name: &str, media: Vec<u8>, mime: &str) -> Result<CustomEmoji> {
        let emoji = self.emojis.upload(name, media, mime).await?;
        if let Some(mut user) = self.identity.current_user() {
            user.custom_emojis.push(emoji.id);
            if let Err(e) = self.identity.update_user(user).await {
                self.emojis.roll_back_upload(&emoji).await;
                return Err(e);
            }
        }
        Ok(emoji)
    }

    /// Delete a custom emoji and drop it from the owner's profile.  If the
    /// profile cannot be updated the emoji is restored.
    pub async fn delete_emoji(&mut self, id: Uuid) -> Result<()> {
        let previous = self.emojis.find(id).cloned();
        self.emojis.delete(id).await?;
        if let Some(mut user) = self.identity.current_user() {
            user.custom_emojis.retain(|e| *e != id);
            if let Err(e) = self.identity.update_user(user).await {
                if let Some(emoji) = previous {
                    self.emojis.roll_back_delete(emoji).await;
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Start a call in the open conversation.
    pub fn start_call(&mut self, kind: CallKind) -> Result<CallState> {
        let Some(conversation_id) = self.conversations.active_conversation().map(|c| c.id) else {
            return self
                .notifier
                .report("start_call", Err(ClientError::NoActiveConversation));
        };
        self.calls.start_call(conversation_id, kind)
    }

    /// Read `text` aloud through the speech function.
    pub async fn speak(&self, text: &str, voice_id: Option<&str>) -> Result<Vec<u8>> {
        let Some(speech) = &self.speech else {
            return self.notifier.report(
                "speak",
                Err(ClientError::Config("speech synthesis is not configured".into())),
            );
        };
        speech
            .synthesize(text, voice_id.unwrap_or(DEFAULT_VOICE_ID))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use parley_store::{
        Conversation, LocalStore, Message, Reaction, Story, StoreError, Result as StoreResult,
    };

    use super::*;
    use crate::config::StoreBackend;

    /// Local store whose profile writes can be switched off.
    struct LockableProfiles {
        inner: LocalStore,
        locked: AtomicBool,
    }

    impl LockableProfiles {
        fn lock(&self) {
            self.locked.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ChatStore for LockableProfiles {
        fn backend(&self) -> &'static str {
            "lockable"
        }

        async fn get_user(&self, id: Uuid) -> StoreResult<User> {
            self.inner.get_user(id).await
        }

        async fn get_user_by_username(&self, username: &str) -> StoreResult<User> {
            self.inner.get_user_by_username(username).await
        }

        async fn list_users(&self) -> StoreResult<Vec<User>> {
            self.inner.list_users().await
        }

        async fn put_user(&self, user: &User) -> StoreResult<()> {
            if self.locked.load(Ordering::SeqCst) {
                return Err(StoreError::Remote {
                    status: 503,
                    message: "profiles are read-only".into(),
                });
            }
            self.inner.put_user(user).await
        }

        async fn get_conversation(&self, id: Uuid) -> StoreResult<Conversation> {
            self.inner.get_conversation(id).await
        }

        async fn list_conversations(&self) -> StoreResult<Vec<Conversation>> {
            self.inner.list_conversations().await
        }

        async fn put_conversation(&self, conversation: &Conversation) -> StoreResult<()> {
            self.inner.put_conversation(conversation).await
        }

        async fn append_message(&self, conversation_id: Uuid, message: &Message) -> StoreResult<Conversation> {
            self.inner.append_message(conversation_id, message).await
        }

        async fn add_reaction(
            &self,
            conversation_id: Uuid,
            message_id: Uuid,
            reaction: &Reaction,
        ) -> StoreResult<Conversation> {
            self.inner.add_reaction(conversation_id, message_id, reaction).await
        }

        async fn edit_message(
            &self,
            conversation_id: Uuid,
            message_id: Uuid,
            new_text: &str,
        ) -> StoreResult<Conversation> {
            self.inner.edit_message(conversation_id, message_id, new_text).await
        }

        async fn delete_message(&self, conversation_id: Uuid, message_id: Uuid) -> StoreResult<Conversation> {
            self.inner.delete_message(conversation_id, message_id).await
        }

        async fn mark_read(&self, conversation_id: Uuid) -> StoreResult<Conversation> {
            self.inner.mark_read(conversation_id).await
        }

        async fn list_custom_emojis(&self, user_id: Uuid) -> StoreResult<Vec<CustomEmoji>> {
            self.inner.list_custom_emojis(user_id).await
        }

        async fn put_custom_emoji(&self, emoji: &CustomEmoji) -> StoreResult<()> {
            self.inner.put_custom_emoji(emoji).await
        }

        async fn delete_custom_emoji(&self, id: Uuid, user_id: Uuid) -> StoreResult<bool> {
            self.inner.delete_custom_emoji(id, user_id).await
        }

        async fn list_stories(&self) -> StoreResult<Vec<Story>> {
            self.inner.list_stories().await
        }

        async fn put_story(&self, story: &Story) -> StoreResult<()> {
            self.inner.put_story(story).await
        }

        async fn update_story_viewers(&self, id: Uuid, viewers: &[Uuid]) -> StoreResult<()> {
            self.inner.update_story_viewers(id, viewers).await
        }

        async fn delete_story(&self, id: Uuid) -> StoreResult<bool> {
            self.inner.delete_story(id).await
        }
    }

    async fn app(dir: &tempfile::TempDir) -> (Arc<LockableProfiles>, ChatApp) {
        let store = Arc::new(LockableProfiles {
            inner: LocalStore::open(&dir.path().join("parley.db")).unwrap(),
            locked: AtomicBool::new(false),
        });
        let config = ClientConfig {
            store: StoreBackend::Local,
            session_path: dir.path().join("session.json"),
            ..ClientConfig::default()
        };
        let app = ChatApp::with_store(config, store.clone()).await.unwrap();
        (store, app)
    }

    #[tokio::test]
    async fn test_emoji_upload_taken_back_when_profile_write_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (store, mut app) = app(&dir).await;
        let alice = app.register("Alice", "alice", "pw1", None).await.unwrap();

        store.lock();
        assert!(app.upload_emoji("party", vec![1, 2, 3], "image/gif").await.is_err());

        assert!(app.emojis.emojis().is_empty());
        assert!(store.list_custom_emojis(alice.id).await.unwrap().is_empty());
        assert!(app.identity.current_user().unwrap().custom_emojis.is_empty());
    }

    #[tokio::test]
    async fn test_emoji_delete_restored_when_profile_write_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (store, mut app) = app(&dir).await;
        let alice = app.register("Alice", "alice", "pw1", None).await.unwrap();
        let emoji = app.upload_emoji("party", vec![1, 2, 3], "image/gif").await.unwrap();

        store.lock();
        assert!(app.delete_emoji(emoji.id).await.is_err());

        assert_eq!(app.emojis.emojis(), &[emoji.clone()]);
        assert_eq!(store.list_custom_emojis(alice.id).await.unwrap(), vec![emoji.clone()]);
        assert_eq!(app.identity.current_user().unwrap().custom_emojis, vec![emoji.id]);
    }
}
