//! Client for the hosted text-to-speech function.
//!
//! Request `{text, voiceId}`, response `{success, audioContent | error}` with
//! base64 audio.  Failures are reported once and never retried.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use parley_shared::ValidationError;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::events::Notifier;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeechResponse {
    success: bool,
    #[serde(default)]
    audio_content: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SpeechResponse {
    fn into_audio(self) -> Result<Vec<u8>> {
        if !self.success {
            let reason = self.error.unwrap_or_else(|| "unknown error".into());
            return Err(ClientError::Speech(reason));
        }
        let encoded = self
            .audio_content
            .ok_or_else(|| ClientError::Speech("response carried no audio".into()))?;
        STANDARD
            .decode(encoded)
            .map_err(|e| ClientError::Speech(format!("invalid audio payload: {e}")))
    }
}

#[derive(Clone)]
pub struct SpeechClient {
    http: reqwest::Client,
    endpoint: String,
    notifier: Notifier,
}

impl SpeechClient {
    pub fn new(endpoint: &str, api_key: Option<&str>, notifier: Notifier) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| ClientError::Config(format!("invalid speech key: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Speech(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            notifier,
        })
    }

    /// Synthesize `text` and return the decoded audio bytes.
    pub async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        let result = self.try_synthesize(text, voice_id).await;
        self.notifier.report("synthesize", result)
    }

    async fn try_synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyField("text").into());
        }

        let resp = self
            .http
            .post(&self.endpoint)
            .json(&SpeechRequest { text, voice_id })
            .send()
            .await
            .map_err(|e| ClientError::Speech(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Speech(format!("HTTP {}: {body}", status.as_u16())));
        }

        let body: SpeechResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::Speech(format!("unreadable response: {e}")))?;
        let audio = body.into_audio()?;
        debug!(bytes = audio.len(), voice_id, "Speech synthesized");
        Ok(audio)
    }
}
