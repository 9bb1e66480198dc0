//! Simulated voice/video call state.  Nothing is captured or transmitted;
//! the session only tracks flags and timing for the UI.

use chrono::{DateTime, Duration, Utc};
use parley_shared::CallKind;
use tracing::info;
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::events::{AppEvent, CallStatePayload, Notifier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallState {
    pub conversation_id: Uuid,
    pub kind: CallKind,
    pub started_at: DateTime<Utc>,
    pub is_muted: bool,
    pub is_video_enabled: bool,
}

pub struct CallSession {
    notifier: Notifier,
    state: Option<CallState>,
}

impl CallSession {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            notifier,
            state: None,
        }
    }

    pub fn state(&self) -> Option<&CallState> {
        self.state.as_ref()
    }

    pub fn is_in_call(&self) -> bool {
        self.state.is_some()
    }

    fn emit_state(&self) {
        let payload = match &self.state {
            Some(s) => CallStatePayload {
                in_call: true,
                is_muted: s.is_muted,
                is_video_enabled: s.is_video_enabled,
            },
            None => CallStatePayload {
                in_call: false,
                is_muted: false,
                is_video_enabled: false,
            },
        };
        self.notifier.emit(AppEvent::CallStateChanged(payload));
    }

    fn active_mut(&mut self) -> Result<&mut CallState> {
        self.state.as_mut().ok_or(ClientError::Call("Not in a call"))
    }

    pub fn start_call(&mut self, conversation_id: Uuid, kind: CallKind) -> Result<CallState> {
        self.start_call_at(conversation_id, kind, Utc::now())
    }

    pub fn start_call_at(&mut self, conversation_id: Uuid, kind: CallKind, now: DateTime<Utc>) -> Result<CallState> {
        if self.state.is_some() {
            return self
                .notifier
                .report("start_call", Err(ClientError::Call("Already in a call")));
        }

        let state = CallState {
            conversation_id,
            kind,
            started_at: now,
            is_muted: false,
            is_video_enabled: kind == CallKind::Video,
        };
        self.state = Some(state.clone());
        info!(%conversation_id, ?kind, "Call started");
        self.emit_state();
        Ok(state)
    }

    /// Hang up; returns how long the call lasted.
    pub fn end_call(&mut self) -> Result<Duration> {
        self.end_call_at(Utc::now())
    }

    pub fn end_call_at(&mut self, now: DateTime<Utc>) -> Result<Duration> {
        let Some(state) = self.state.take() else {
            return self
                .notifier
                .report("end_call", Err(ClientError::Call("Not in a call")));
        };
        let elapsed = now - state.started_at;
        info!(conversation_id = %state.conversation_id, seconds = elapsed.num_seconds(), "Call ended");
        self.emit_state();
        Ok(elapsed)
    }

    pub fn toggle_mute(&mut self) -> Result<bool> {
        let result = self.active_mut().map(|s| {
            s.is_muted = !s.is_muted;
            s.is_muted
        });
        let muted = self.notifier.report("toggle_mute", result)?;
        info!(muted, "Mute toggled");
        self.emit_state();
        Ok(muted)
    }

    /// Video calls only.
    pub fn toggle_video(&mut self) -> Result<bool> {
        let result = self.active_mut().and_then(|s| {
            if s.kind != CallKind::Video {
                return Err(ClientError::Call("Video is not available in a voice call"));
            }
            s.is_video_enabled = !s.is_video_enabled;
            Ok(s.is_video_enabled)
        });
        let enabled = self.notifier.report("toggle_video", result)?;
        info!(video = enabled, "Video toggled");
        self.emit_state();
        Ok(enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_lifecycle() {
        let notifier = Notifier::new();
        let mut events = notifier.subscribe();
        let mut calls = CallSession::new(notifier);
        let conv = Uuid::new_v4();
        let t = Utc::now();

        let state = calls.start_call_at(conv, CallKind::Video, t).unwrap();
        assert!(state.is_video_enabled);
        assert!(calls.start_call(conv, CallKind::Voice).is_err());

        assert!(calls.toggle_mute().unwrap());
        assert!(!calls.toggle_video().unwrap());
        assert_eq!(
            calls.end_call_at(t + Duration::seconds(90)).unwrap(),
            Duration::seconds(90)
        );
        assert!(!calls.is_in_call());

        assert!(matches!(
            events.try_recv().unwrap(),
            AppEvent::CallStateChanged(CallStatePayload { in_call: true, .. })
        ));
    }

    #[test]
    fn test_voice_call_has_no_video() {
        let mut calls = CallSession::new(Notifier::new());
        calls.start_call(Uuid::new_v4(), CallKind::Voice).unwrap();
        assert!(calls.toggle_video().is_err());
        assert!(!calls.state().unwrap().is_video_enabled);
    }

    #[test]
    fn test_controls_need_a_call() {
        let mut calls = CallSession::new(Notifier::new());
        assert!(calls.toggle_mute().is_err());
        assert!(calls.end_call().is_err());
    }
}
