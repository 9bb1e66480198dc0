//! Attachment payloads embedded as `data:` URIs.
//!
//! Attachments and custom emoji media are never stored as separate blobs; the
//! encoded bytes travel inside the record as `data:<mime>;base64,<payload>`.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::ValidationError;
use crate::types::MessageKind;

/// A decoded `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Encode as `data:<mime>;base64,<payload>`.
    pub fn encode(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    /// Parse a base64 `data:` URI.  Percent-encoded (non-base64) URIs are
    /// rejected.
    pub fn parse(uri: &str) -> Result<Self, ValidationError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| ValidationError::MalformedDataUri("missing 'data:' prefix".into()))?;

        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ValidationError::MalformedDataUri("missing ',' separator".into()))?;

        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| ValidationError::MalformedDataUri("payload is not base64".into()))?;

        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| ValidationError::MalformedDataUri(e.to_string()))?;

        Ok(Self {
            mime: if mime.is_empty() {
                "text/plain".to_string()
            } else {
                mime.to_string()
            },
            bytes,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Check that a payload of `mime`/`size` may be attached to a message of
/// `kind`.
pub fn validate_attachment(
    kind: MessageKind,
    mime: &str,
    size: usize,
    max_size: usize,
) -> Result<(), ValidationError> {
    if kind == MessageKind::Text {
        return Err(ValidationError::UnsupportedMediaType {
            mime: mime.to_string(),
            kind: kind.to_string(),
        });
    }
    if size == 0 {
        return Err(ValidationError::EmptyField("attachment"));
    }
    if size > max_size {
        return Err(ValidationError::AttachmentTooLarge {
            size,
            max: max_size,
        });
    }
    if let Some(family) = kind.mime_family() {
        if !mime.starts_with(family) {
            return Err(ValidationError::UnsupportedMediaType {
                mime: mime.to_string(),
                kind: kind.to_string(),
            });
        }
    }
    Ok(())
}

/// Custom emoji media must be an image or a short video.
pub fn validate_emoji_media(mime: &str, size: usize, max_size: usize) -> Result<(), ValidationError> {
    if size == 0 {
        return Err(ValidationError::EmptyField("emoji media"));
    }
    if size > max_size {
        return Err(ValidationError::AttachmentTooLarge {
            size,
            max: max_size,
        });
    }
    if !(mime.starts_with("image/") || mime.starts_with("video/")) {
        return Err(ValidationError::UnsupportedMediaType {
            mime: mime.to_string(),
            kind: "custom emoji".to_string(),
        });
    }
    Ok(())
}
