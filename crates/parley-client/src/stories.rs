//! Ephemeral stories: creation, expiry filtering, viewer tracking and the
//! open-viewer position.
//!
//! Expired stories are never deleted; every listing filters them against the
//! current time.  The `_at` variants take that time explicitly.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parley_shared::{StoryKind, ValidationError};
use parley_store::{ChatStore, Story, User};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::events::{AppEvent, Notifier};

/// Which story is open: the owner and the position in their sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoryCursor {
    pub user_id: Uuid,
    pub story_id: Uuid,
    pub index: usize,
}

pub struct Stories {
    store: Arc<dyn ChatStore>,
    notifier: Notifier,
    session: watch::Receiver<Option<User>>,
    /// Newest first.
    stories: Vec<Story>,
    viewing: Option<StoryCursor>,
}

impl Stories {
    pub fn new(store: Arc<dyn ChatStore>, notifier: Notifier, session: watch::Receiver<Option<User>>) -> Self {
        Self {
            store,
            notifier,
            session,
            stories: Vec::new(),
            viewing: None,
        }
    }

    fn me(&self) -> Result<Uuid> {
        self.session
            .borrow()
            .as_ref()
            .map(|u| u.id)
            .ok_or(ClientError::NotSignedIn)
    }

    /// Active stories, newest first.
    pub fn stories(&self) -> Vec<&Story> {
        self.stories_at(Utc::now())
    }

    pub fn stories_at(&self, now: DateTime<Utc>) -> Vec<&Story> {
        self.stories.iter().filter(|s| s.is_active_at(now)).collect()
    }

    pub async fn load_stories(&mut self) -> Result<()> {
        self.load_stories_at(Utc::now()).await
    }

    pub async fn refresh_stories(&mut self) -> Result<()> {
        self.load_stories().await
    }

    pub async fn load_stories_at(&mut self, now: DateTime<Utc>) -> Result<()> {
        let result = self.store.list_stories().await.map_err(ClientError::from);
        let mut stories = self.notifier.report("load_stories", result)?;

        stories.retain(|s| s.is_active_at(now));
        stories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!(count = stories.len(), "Stories loaded");

        self.stories = stories;
        if let Some(cursor) = self.viewing {
            if !self.stories.iter().any(|s| s.id == cursor.story_id) {
                self.viewing = None;
            }
        }
        self.notifier.emit(AppEvent::StoriesChanged);
        Ok(())
    }

    pub async fn create_story(
        &mut self,
        kind: StoryKind,
        content: &str,
        background: Option<String>,
    ) -> Result<Story> {
        self.create_story_at(kind, content, background, Utc::now()).await
    }

    pub async fn create_story_at(
        &mut self,
        kind: StoryKind,
        content: &str,
        background: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Story> {
        let result = self.try_create(kind, content, background, now).await;
        self.notifier.report("create_story", result)
    }

    async fn try_create(
        &mut self,
        kind: StoryKind,
        content: &str,
        background: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Story> {
        let me = self.me()?;
        if content.trim().is_empty() {
            return Err(ValidationError::EmptyField("story content").into());
        }
        if background.is_some() && kind != StoryKind::Text {
            return Err(ValidationError::InvalidValue {
                field: "background",
                value: format!("not allowed on {kind} stories"),
            }
            .into());
        }

        let story = Story::new(me, kind, content.to_string(), background, now);
        self.store.put_story(&story).await?;
        info!(story_id = %story.id, %kind, expires_at = %story.expires_at, "Story posted");

        self.stories.insert(0, story.clone());
        self.notifier.emit(AppEvent::StoriesChanged);
        Ok(story)
    }

    /// One user's active stories in posting order (the viewing sequence).
    pub fn stories_for_user(&self, user_id: Uuid) -> Vec<&Story> {
        self.stories_for_user_at(user_id, Utc::now())
    }

    pub fn stories_for_user_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Vec<&Story> {
        let mut sequence: Vec<&Story> = self
            .stories
            .iter()
            .filter(|s| s.user_id == user_id && s.is_active_at(now))
            .collect();
        sequence.sort_by_key(|s| s.created_at);
        sequence
    }

    /// Directory entries with at least one active story, in directory order.
    pub fn users_with_stories<'a>(&self, directory: &'a [User]) -> Vec<&'a User> {
        self.users_with_stories_at(directory, Utc::now())
    }

    pub fn users_with_stories_at<'a>(&self, directory: &'a [User], now: DateTime<Utc>) -> Vec<&'a User> {
        let owners: HashSet<Uuid> = self
            .stories
            .iter()
            .filter(|s| s.is_active_at(now))
            .map(|s| s.user_id)
            .collect();
        directory.iter().filter(|u| owners.contains(&u.id)).collect()
    }

    pub fn viewing(&self) -> Option<StoryCursor> {
        self.viewing
    }

    pub fn current_story(&self) -> Option<&Story> {
        let cursor = self.viewing?;
        self.stories.iter().find(|s| s.id == cursor.story_id)
    }

    /// Open `user_id`'s first story.
    pub async fn view_story(&mut self, user_id: Uuid) -> Result<Story> {
        self.open_at(user_id, 0, "view_story").await
    }

    /// Open the story at `index` of `user_id`'s sequence; `story_id` must be
    /// the story at that position.
    pub async fn set_viewing_story(&mut self, story_id: Uuid, user_id: Uuid, index: usize) -> Result<Story> {
        let matches = self
            .stories_for_user(user_id)
            .get(index)
            .is_some_and(|s| s.id == story_id);
        if !matches {
            return self
                .notifier
                .report("set_viewing_story", Err(ClientError::NotFound("story")));
        }
        self.open_at(user_id, index, "set_viewing_story").await
    }

    /// Step forward; past the last story the viewer closes and `None` comes
    /// back.
    pub async fn next_story(&mut self) -> Result<Option<Story>> {
        let Some(cursor) = self.viewing else {
            return Ok(None);
        };
        let len = self.stories_for_user(cursor.user_id).len();
        if cursor.index + 1 >= len {
            self.close_viewer();
            return Ok(None);
        }
        self.open_at(cursor.user_id, cursor.index + 1, "next_story")
            .await
            .map(Some)
    }

    /// Step back; before the first story the viewer closes.
    pub async fn previous_story(&mut self) -> Result<Option<Story>> {
        let Some(cursor) = self.viewing else {
            return Ok(None);
        };
        if cursor.index == 0 {
            self.close_viewer();
            return Ok(None);
        }
        self.open_at(cursor.user_id, cursor.index - 1, "previous_story")
            .await
            .map(Some)
    }

    pub fn close_viewer(&mut self) {
        self.viewing = None;
    }

    async fn open_at(&mut self, user_id: Uuid, index: usize, operation: &'static str) -> Result<Story> {
        let result = self.try_open(user_id, index).await;
        self.notifier.report(operation, result)
    }

    async fn try_open(&mut self, user_id: Uuid, index: usize) -> Result<Story> {
        let me = self.me()?;
        let story = self
            .stories_for_user(user_id)
            .get(index)
            .map(|s| (*s).clone())
            .ok_or(ClientError::NotFound("story"))?;

        let story = self.record_view(story, me).await?;
        self.viewing = Some(StoryCursor {
            user_id,
            story_id: story.id,
            index,
        });
        Ok(story)
    }

    /// Add `viewer` once and persist the viewer set.
    async fn record_view(&mut self, mut story: Story, viewer: Uuid) -> Result<Story> {
        if !story.add_viewer(viewer) {
            return Ok(story);
        }
        self.store
            .update_story_viewers(story.id, &story.viewers)
            .await
            .map_err(ClientError::absent("story"))?;
        debug!(story_id = %story.id, %viewer, "Story view recorded");

        if let Some(slot) = self.stories.iter_mut().find(|s| s.id == story.id) {
            *slot = story.clone();
        }
        Ok(story)
    }

    pub fn reset(&mut self) {
        self.stories.clear();
        self.viewing = None;
        self.notifier.emit(AppEvent::StoriesChanged);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use parley_store::LocalStore;

    use super::*;

    async fn setup() -> (tempfile::TempDir, Arc<dyn ChatStore>, watch::Sender<Option<User>>, Stories) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ChatStore> = Arc::new(LocalStore::open(&dir.path().join("s.db")).unwrap());
        let alice = User::new("Alice".into(), "alice".into(), None, String::new());
        let (session, rx) = watch::channel(Some(alice));
        let stories = Stories::new(store.clone(), Notifier::new(), rx);
        (dir, store, session, stories)
    }

    #[tokio::test]
    async fn test_story_visible_for_exactly_24_hours() {
        let (_dir, _store, session, mut stories) = setup().await;
        let owner = session.borrow().as_ref().unwrap().id;
        let t = Utc::now();
        stories
            .create_story_at(StoryKind::Text, "hello", Some("#112233".into()), t)
            .await
            .unwrap();

        assert_eq!(stories.stories_for_user_at(owner, t).len(), 1);
        let last_moment = t + Duration::hours(24) - Duration::nanoseconds(1);
        assert_eq!(stories.stories_for_user_at(owner, last_moment).len(), 1);
        assert!(stories.stories_for_user_at(owner, t + Duration::hours(24)).is_empty());

        stories.load_stories_at(t + Duration::hours(25)).await.unwrap();
        assert!(stories.stories_at(t + Duration::hours(25)).is_empty());
    }

    #[tokio::test]
    async fn test_background_only_on_text_stories() {
        let (_dir, _store, _session, mut stories) = setup().await;
        let err = stories
            .create_story(StoryKind::Image, "data:image/png;base64,AA==", Some("#fff".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(stories.stories().is_empty());
    }

    #[tokio::test]
    async fn test_viewer_recorded_once() {
        let (_dir, store, session, mut stories) = setup().await;
        let alice = session.borrow().clone().unwrap();
        let story = stories.create_story(StoryKind::Text, "hi", None).await.unwrap();

        let bob = User::new("Bob".into(), "bob".into(), None, String::new());
        session.send_replace(Some(bob.clone()));

        stories.view_story(alice.id).await.unwrap();
        stories.close_viewer();
        stories.view_story(alice.id).await.unwrap();

        let persisted = store.list_stories().await.unwrap();
        assert_eq!(persisted[0].id, story.id);
        assert_eq!(persisted[0].viewers, vec![bob.id]);
        assert_eq!(stories.current_story().unwrap().viewers, vec![bob.id]);
    }

    #[tokio::test]
    async fn test_navigation_closes_past_either_end() {
        let (_dir, _store, session, mut stories) = setup().await;
        let alice = session.borrow().clone().unwrap();
        let t = Utc::now();
        let first = stories
            .create_story_at(StoryKind::Text, "one", None, t - Duration::minutes(2))
            .await
            .unwrap();
        let second = stories
            .create_story_at(StoryKind::Text, "two", None, t - Duration::minutes(1))
            .await
            .unwrap();

        let opened = stories.view_story(alice.id).await.unwrap();
        assert_eq!(opened.id, first.id);
        assert_eq!(stories.next_story().await.unwrap().unwrap().id, second.id);
        assert!(stories.next_story().await.unwrap().is_none());
        assert!(stories.viewing().is_none());

        stories.set_viewing_story(second.id, alice.id, 1).await.unwrap();
        assert_eq!(stories.previous_story().await.unwrap().unwrap().id, first.id);
        assert!(stories.previous_story().await.unwrap().is_none());
        assert!(stories.viewing().is_none());

        assert!(stories.set_viewing_story(first.id, alice.id, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_users_with_stories_resolves_directory() {
        let (_dir, _store, session, mut stories) = setup().await;
        let alice = session.borrow().clone().unwrap();
        let bob = User::new("Bob".into(), "bob".into(), None, String::new());
        stories.create_story(StoryKind::Text, "hi", None).await.unwrap();

        let directory = vec![alice.clone(), bob];
        let with = stories.users_with_stories(&directory);
        assert_eq!(with.len(), 1);
        assert_eq!(with[0].id, alice.id);
    }
}
