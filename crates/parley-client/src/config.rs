//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so the client starts against a local
//! database with zero configuration.

use std::path::PathBuf;
use std::sync::Arc;

use directories::ProjectDirs;
use parley_shared::constants::MAX_ATTACHMENT_SIZE;
use parley_store::{ChatStore, LocalStore, RemoteStore};

use crate::error::{ClientError, Result};

/// Which [`ChatStore`] implementation to open at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Local,
    Remote,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Env: `PARLEY_STORE` (`local` | `remote`)
    /// Default: `local`
    pub store: StoreBackend,

    /// SQLite file for the local store.
    /// Env: `PARLEY_DB_PATH`
    /// Default: `parley.db` in the platform data directory.
    pub db_path: Option<PathBuf>,

    /// Env: `PARLEY_REMOTE_URL`
    pub remote_url: Option<String>,

    /// Env: `PARLEY_REMOTE_KEY`
    pub remote_key: Option<String>,

    /// Env: `PARLEY_SESSION_PATH`
    /// Default: `session.json` next to the local database.
    pub session_path: PathBuf,

    /// Speech function endpoint; speech is disabled without it.
    /// Env: `PARLEY_SPEECH_URL`
    pub speech_url: Option<String>,

    /// Env: `PARLEY_SPEECH_KEY`
    pub speech_key: Option<String>,

    /// Ceiling on decoded attachment size.
    /// Env: `PARLEY_MAX_ATTACHMENT_BYTES`
    /// Default: 10 MiB
    pub max_attachment_bytes: usize,
}

fn default_session_path() -> PathBuf {
    ProjectDirs::from("org", "parley", "parley")
        .map(|dirs| dirs.data_dir().join("session.json"))
        .unwrap_or_else(|| PathBuf::from("parley-session.json"))
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            store: StoreBackend::Local,
            db_path: None,
            remote_url: None,
            remote_key: None,
            session_path: default_session_path(),
            speech_url: None,
            speech_key: None,
            max_attachment_bytes: MAX_ATTACHMENT_SIZE,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("PARLEY_STORE") {
            match raw.parse() {
                Ok(backend) => config.store = backend,
                Err(e) => tracing::warn!(value = %raw, error = %e, "Invalid PARLEY_STORE, using default"),
            }
        }

        if let Some(path) = lookup("PARLEY_DB_PATH") {
            config.db_path = Some(PathBuf::from(path));
        }

        config.remote_url = lookup("PARLEY_REMOTE_URL").filter(|s| !s.is_empty());
        config.remote_key = lookup("PARLEY_REMOTE_KEY").filter(|s| !s.is_empty());

        if let Some(path) = lookup("PARLEY_SESSION_PATH") {
            config.session_path = PathBuf::from(path);
        } else if let Some(db) = &config.db_path {
            config.session_path = db.with_file_name("session.json");
        }

        config.speech_url = lookup("PARLEY_SPEECH_URL").filter(|s| !s.is_empty());
        config.speech_key = lookup("PARLEY_SPEECH_KEY").filter(|s| !s.is_empty());

        if let Some(raw) = lookup("PARLEY_MAX_ATTACHMENT_BYTES") {
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => config.max_attachment_bytes = n,
                _ => tracing::warn!(value = %raw, "Invalid PARLEY_MAX_ATTACHMENT_BYTES, using default"),
            }
        }

        config
    }

    /// Open the configured store.
    pub fn open_store(&self) -> Result<Arc<dyn ChatStore>> {
        match self.store {
            StoreBackend::Local => {
                let store = match &self.db_path {
                    Some(path) => LocalStore::open(path)?,
                    None => LocalStore::open_default()?,
                };
                Ok(Arc::new(store))
            }
            StoreBackend::Remote => {
                let url = self
                    .remote_url
                    .as_deref()
                    .ok_or_else(|| ClientError::Config("PARLEY_REMOTE_URL is not set".into()))?;
                let key = self
                    .remote_key
                    .as_deref()
                    .ok_or_else(|| ClientError::Config("PARLEY_REMOTE_KEY is not set".into()))?;
                Ok(Arc::new(RemoteStore::connect(url, key)?))
            }
        }
    }
}
