//! # parley-store
//!
//! Persistence for Parley.  The [`ChatStore`] trait is the single interface
//! the coordinators talk to; it has two interchangeable implementations
//! selected at startup:
//!
//! - [`LocalStore`] -- an embedded SQLite database holding whole records per
//!   collection (users, conversations, custom emojis, stories).
//! - [`RemoteStore`] -- a hosted relational backend reached over a
//!   PostgREST-style HTTP API, with conversations normalized into
//!   participant, message and reaction tables and reassembled on read.
//!
//! Both implement the derived conversation operations (append, react, edit,
//! delete, mark read) on top of the pure mutation helpers in [`mutations`].

pub mod local;
pub mod models;
pub mod mutations;
pub mod remote;
pub mod store;

mod error;

pub use error::{Result, StoreError};
pub use local::LocalStore;
pub use models::*;
pub use remote::RemoteStore;
pub use store::ChatStore;
