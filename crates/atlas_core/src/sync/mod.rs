//! Sentence exchange with a shared database.

pub mod share;

pub use share::{sync_share_database, SyncDirection, SyncError, SyncReport};
