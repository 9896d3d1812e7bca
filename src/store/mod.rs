//! Metadata Store
//!
//! Persistent mapping from (relative directory, entry name) to a
//! [`MetadataRecord`], plus the set of directories known to a snapshot.
//! One run owns a store exclusively and closes it exactly once, see
//! [`with_store`].

pub mod memory;
pub mod persistence;

pub use memory::MemoryMetadataStore;
pub use persistence::SledMetadataStore;

use crate::error::StorageError;
use crate::types::{DirectoryExpectationMap, DirectorySet, MetadataRecord, SnapshotInfo};
use tracing::error;

/// Key of the snapshot info record. Never collides with entry keys,
/// which start with `D` or `F`.
pub(crate) const INFO_KEY: &[u8] = b"I";

/// Metadata Store interface
///
/// Writes issued between [`begin_snapshot`](MetadataStore::begin_snapshot)
/// and [`commit_snapshot`](MetadataStore::commit_snapshot) become visible
/// together, and replace the previous snapshot wholesale. Reads always see
/// the last committed state.
pub trait MetadataStore {
    /// Add directories to the directory set. Re-adding is a no-op.
    fn upsert_directories(&mut self, paths: &[&str]) -> Result<(), StorageError>;

    /// Insert or replace the record for `name` inside `dir`.
    fn upsert_file(
        &mut self,
        dir: &str,
        name: &str,
        record: &MetadataRecord,
    ) -> Result<(), StorageError>;

    /// Point lookup of one file record.
    fn lookup_file(&self, dir: &str, name: &str) -> Result<Option<MetadataRecord>, StorageError>;

    /// Every file record directly inside `dir`, keyed by name.
    fn read_files_of(&self, dir: &str) -> Result<DirectoryExpectationMap, StorageError>;

    /// Every known directory, root included as "".
    fn read_all_directories(&self) -> Result<DirectorySet, StorageError>;

    /// Start buffering writes for an atomic snapshot.
    fn begin_snapshot(&mut self) -> Result<(), StorageError>;

    /// Atomically replace the stored snapshot with the buffered writes.
    fn commit_snapshot(&mut self, info: &SnapshotInfo) -> Result<(), StorageError>;

    /// Drop buffered writes, leaving the committed snapshot untouched.
    fn abort_snapshot(&mut self);

    /// Info recorded by the last committed snapshot, if any.
    fn snapshot_info(&self) -> Result<Option<SnapshotInfo>, StorageError>;

    /// Flush and release the store.
    fn close(self) -> Result<(), StorageError>
    where
        Self: Sized;
}

/// Run `f` against `store`, then close the store whatever the outcome.
///
/// An error from `f` wins over an error from closing; the close error is
/// logged in that case. A snapshot left open by a failed `f` is aborted.
pub fn with_store<S, T, E, F>(mut store: S, f: F) -> Result<T, E>
where
    S: MetadataStore,
    E: From<StorageError>,
    F: FnOnce(&mut S) -> Result<T, E>,
{
    let result = f(&mut store);
    if result.is_err() {
        store.abort_snapshot();
    }

    match (result, store.close()) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            error!("Failed to close metadata store after error: {}", close_err);
            Err(e)
        }
    }
}

pub(crate) fn encode_record(record: &MetadataRecord) -> Result<Vec<u8>, StorageError> {
    bincode::serialize(record)
        .map_err(|e| StorageError::Write(format!("Failed to serialize metadata record: {}", e)))
}

pub(crate) fn decode_record(bytes: &[u8]) -> Result<MetadataRecord, StorageError> {
    bincode::deserialize(bytes)
        .map_err(|e| StorageError::Corrupt(format!("Failed to deserialize metadata record: {}", e)))
}

pub(crate) fn encode_info(info: &SnapshotInfo) -> Result<Vec<u8>, StorageError> {
    bincode::serialize(info)
        .map_err(|e| StorageError::Write(format!("Failed to serialize snapshot info: {}", e)))
}

pub(crate) fn decode_info(bytes: &[u8]) -> Result<SnapshotInfo, StorageError> {
    bincode::deserialize(bytes)
        .map_err(|e| StorageError::Corrupt(format!("Failed to deserialize snapshot info: {}", e)))
}
