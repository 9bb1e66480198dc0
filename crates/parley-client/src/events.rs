//! Application events fanned out to whoever renders them.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::{ClientError, Result};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallStatePayload {
    pub in_call: bool,
    pub is_muted: bool,
    pub is_video_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum AppEvent {
    /// A user-facing message (the toast).
    Notice { level: NoticeLevel, message: String },
    ConversationsChanged,
    StoriesChanged,
    SessionChanged,
    CallStateChanged(CallStatePayload),
}

/// Broadcast sender shared by every coordinator.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<AppEvent>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: AppEvent) {
        // no receivers is fine
        let _ = self.tx.send(event);
    }

    pub fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        self.emit(AppEvent::Notice {
            level,
            message: message.into(),
        });
    }

    /// Coordinator boundary: log a failed operation and turn it into an
    /// error notice, then hand the result back unchanged.
    pub fn report<T>(&self, operation: &'static str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            log_failure(operation, e);
            self.notice(NoticeLevel::Error, e.to_string());
        }
        result
    }
}

fn log_failure(operation: &'static str, e: &ClientError) {
    if e.is_rejection() {
        tracing::warn!(operation, error = %e, "Operation rejected");
    } else {
        tracing::error!(operation, error = %e, "Operation failed");
    }
}
