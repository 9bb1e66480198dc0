/// Application name
pub const APP_NAME: &str = "Parley";

/// Text written over a message when it is soft-deleted
pub const DELETED_MESSAGE_PLACEHOLDER: &str = "This message was deleted";

/// Story lifetime in hours, fixed at creation
pub const STORY_LIFETIME_HOURS: i64 = 24;

/// Maximum decoded attachment size in bytes (10 MiB)
pub const MAX_ATTACHMENT_SIZE: usize = 10 * 1024 * 1024;

/// Maximum decoded custom emoji size in bytes (2 MiB)
pub const MAX_CUSTOM_EMOJI_SIZE: usize = 2 * 1024 * 1024;

/// Maximum custom emoji name length in characters
pub const MAX_CUSTOM_EMOJI_NAME_LEN: usize = 32;

/// Maximum text message length in characters
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Default voice used by the speech function
pub const DEFAULT_VOICE_ID: &str = "alloy";
