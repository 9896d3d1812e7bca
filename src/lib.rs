//! Mirror: directory tree snapshots and verification
//!
//! Records the size, modification time and content digest of every file
//! under a root into a metadata store, and later walks the same root to
//! report every entry that was added, removed or changed.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod snapshot;
pub mod store;
pub mod tree;
pub mod types;
pub mod verify;
