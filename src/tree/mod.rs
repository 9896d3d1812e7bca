//! Filesystem side of a snapshot
//!
//! Walks a directory tree and computes per-file metadata and content
//! digests.

pub mod hasher;
pub mod path;
pub mod probe;
pub mod scanner;
