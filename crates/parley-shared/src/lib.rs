//! # parley-shared
//!
//! Types, limits and small helpers shared by the Parley store and client
//! crates: status/kind enums, data-URI attachments, credential hashing and the
//! generated default avatar.

pub mod attachment;
pub mod avatar;
pub mod constants;
pub mod credential;
pub mod error;
pub mod types;

pub use error::ValidationError;
pub use types::{CallKind, MessageKind, StoryKind, UserStatus};
