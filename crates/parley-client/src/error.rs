use parley_shared::error::CredentialError;
use parley_shared::ValidationError;
use parley_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the coordinators.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("You are not signed in")]
    NotSignedIn,

    #[error("No conversation is open")]
    NoActiveConversation,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Deliberately does not say whether the username or the credential was
    /// wrong.
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("Speech synthesis failed: {0}")]
    Speech(String),

    #[error("{0}")]
    Call(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session file error: {0}")]
    Session(#[from] std::io::Error),

    #[error("Session file is corrupt: {0}")]
    SessionFormat(#[from] serde_json::Error),
}

impl ClientError {
    /// Rejections caused by the caller's input or state, as opposed to
    /// failures of storage or a network collaborator.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ClientError::NotSignedIn
                | ClientError::NoActiveConversation
                | ClientError::NotFound(_)
                | ClientError::InvalidCredentials
                | ClientError::UsernameTaken(_)
                | ClientError::Validation(_)
                | ClientError::Call(_)
        )
    }

    /// Map a store "absent" result onto a named not-found error.
    pub(crate) fn absent(what: &'static str) -> impl FnOnce(StoreError) -> ClientError {
        move |e| {
            if e.is_not_found() {
                ClientError::NotFound(what)
            } else {
                ClientError::Store(e)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
