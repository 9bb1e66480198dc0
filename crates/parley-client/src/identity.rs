//! Signed-in user, user directory and credential checks.

use std::sync::Arc;

use chrono::Utc;
use parley_shared::avatar::default_avatar;
use parley_shared::credential::{hash_credential, verify_credential};
use parley_shared::{UserStatus, ValidationError};
use parley_store::{ChatStore, User};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{ClientError, Result};
use crate::events::{AppEvent, Notifier};
use crate::session::SessionFile;

pub struct Identity {
    store: Arc<dyn ChatStore>,
    notifier: Notifier,
    session: SessionFile,
    current: watch::Sender<Option<User>>,
    users: Vec<User>,
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::EmptyField(field).into());
    }
    Ok(value)
}

impl Identity {
    pub fn new(store: Arc<dyn ChatStore>, notifier: Notifier, session: SessionFile) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            store,
            notifier,
            session,
            current,
            users: Vec::new(),
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.current.borrow().clone()
    }

    /// Follows the signed-in user.  Other coordinators hold one of these.
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.current.subscribe()
    }

    /// The directory as of the last refresh, ordered by username.
    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn user(&self, id: uuid::Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn set_current(&self, user: Option<User>) {
        self.current.send_replace(user);
        self.notifier.emit(AppEvent::SessionChanged);
    }

    fn upsert_directory(&mut self, user: &User) {
        match self.users.iter_mut().find(|u| u.id == user.id) {
            Some(slot) => *slot = user.clone(),
            None => {
                let pos = self.users.partition_point(|u| u.username < user.username);
                self.users.insert(pos, user.clone());
            }
        }
    }

    pub async fn refresh_users(&mut self) -> Result<()> {
        let result = self.store.list_users().await.map_err(ClientError::from);
        let users = self.notifier.report("refresh_users", result)?;
        self.users = users;
        Ok(())
    }

    /// Re-activate the user named by the session marker, if any.
    ///
    /// Never fails: when the directory cannot be loaded the failure has been
    /// reported and the app starts signed out with an empty directory.  The
    /// marker is kept so the next start can try again.
    pub async fn restore_session(&mut self) -> Option<User> {
        if self.refresh_users().await.is_err() {
            self.users.clear();
            return None;
        }

        let username = match self.session.load() {
            Ok(Some(username)) => username,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable session marker");
                return None;
            }
        };

        match self.users.iter().find(|u| u.username == username).cloned() {
            Some(user) => {
                info!(username = %user.username, "Session restored");
                self.set_current(Some(user.clone()));
                Some(user)
            }
            None => {
                warn!(%username, "Session marker names an unknown user");
                None
            }
        }
    }

    pub async fn login(&mut self, username: &str, credential: &str) -> Result<User> {
        let result = self.try_login(username, credential).await;
        self.notifier.report("login", result)
    }

    async fn try_login(&mut self, username: &str, credential: &str) -> Result<User> {
        let username = username.trim();
        if username.is_empty() || credential.is_empty() {
            return Err(ClientError::InvalidCredentials);
        }

        let mut user = match self.store.get_user_by_username(username).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return Err(ClientError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };
        let verified = user
            .credential_hash
            .as_deref()
            .is_some_and(|hash| verify_credential(credential, hash));
        if !verified {
            return Err(ClientError::InvalidCredentials);
        }

        user.status = UserStatus::Online;
        user.last_seen = Some(Utc::now());
        self.store.put_user(&user).await?;

        self.remember(&user.username);
        self.upsert_directory(&user);
        self.set_current(Some(user.clone()));
        info!(username = %user.username, "Signed in");
        Ok(user)
    }

    pub async fn register(
        &mut self,
        name: &str,
        username: &str,
        credential: &str,
        avatar: Option<String>,
    ) -> Result<User> {
        let result = self.try_register(name, username, credential, avatar).await;
        self.notifier.report("register", result)
    }

    async fn try_register(
        &mut self,
        name: &str,
        username: &str,
        credential: &str,
        avatar: Option<String>,
    ) -> Result<User> {
        let name = required("name", name)?;
        let username = required("username", username)?;
        if credential.is_empty() {
            return Err(ValidationError::EmptyField("password").into());
        }

        if self.users.iter().any(|u| u.username == username) {
            return Err(ClientError::UsernameTaken(username.to_string()));
        }
        match self.store.get_user_by_username(username).await {
            Ok(_) => return Err(ClientError::UsernameTaken(username.to_string())),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let avatar = avatar
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| default_avatar(name));
        let hash = hash_credential(credential)?;
        let user = User::new(name.to_string(), username.to_string(), Some(hash), avatar);
        self.store.put_user(&user).await?;

        self.remember(&user.username);
        self.upsert_directory(&user);
        self.set_current(Some(user.clone()));
        info!(username = %user.username, user_id = %user.id, "Registered");
        Ok(user)
    }

    fn remember(&self, username: &str) {
        if let Err(e) = self.session.save(username) {
            warn!(error = %e, path = %self.session.path().display(), "Failed to persist session marker");
        }
    }

    /// Marks the user offline (best effort) and clears the session.
    pub async fn logout(&mut self) {
        let Some(mut user) = self.current_user() else {
            return;
        };

        user.status = UserStatus::Offline;
        user.last_seen = Some(Utc::now());
        match self.store.put_user(&user).await {
            Ok(()) => self.upsert_directory(&user),
            Err(e) => warn!(error = %e, "Failed to record offline status"),
        }

        if let Err(e) = self.session.clear() {
            warn!(error = %e, "Failed to clear session marker");
        }
        self.set_current(None);
        info!(username = %user.username, "Signed out");
    }

    pub async fn update_status(&mut self, status: UserStatus) -> Result<User> {
        let result = self.try_update_status(status).await;
        self.notifier.report("update_status", result)
    }

    async fn try_update_status(&mut self, status: UserStatus) -> Result<User> {
        let mut user = self.current_user().ok_or(ClientError::NotSignedIn)?;
        user.status = status;
        user.last_seen = Some(Utc::now());
        self.store.put_user(&user).await?;

        self.upsert_directory(&user);
        self.set_current(Some(user.clone()));
        info!(%status, "Status updated");
        Ok(user)
    }

    /// Replace the record with the same id.
    pub async fn update_user(&mut self, user: User) -> Result<User> {
        let result = self.try_update_user(user).await;
        self.notifier.report("update_user", result)
    }

    async fn try_update_user(&mut self, user: User) -> Result<User> {
        required("name", &user.name)?;
        required("username", &user.username)?;
        if self
            .users
            .iter()
            .any(|u| u.username == user.username && u.id != user.id)
        {
            return Err(ClientError::UsernameTaken(user.username));
        }

        self.store.put_user(&user).await?;

        self.upsert_directory(&user);
        let is_current = self.current.borrow().as_ref().is_some_and(|c| c.id == user.id);
        if is_current {
            self.set_current(Some(user.clone()));
        }
        info!(user_id = %user.id, "Profile updated");
        Ok(user)
    }
}
