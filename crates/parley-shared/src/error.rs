use thiserror::Error;

/// Input rejected before any storage call is attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("Message too long: {len} characters (max {max})")]
    MessageTooLong { len: usize, max: usize },

    #[error("Attachment too large: {size} bytes (max {max})")]
    AttachmentTooLarge { size: usize, max: usize },

    #[error("Unsupported media type '{mime}' for {kind}")]
    UnsupportedMediaType { mime: String, kind: String },

    #[error("Malformed data URI: {0}")]
    MalformedDataUri(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Credential hashing failure (argon2).
#[derive(Error, Debug)]
#[error("Credential hashing failed: {0}")]
pub struct CredentialError(pub String);
