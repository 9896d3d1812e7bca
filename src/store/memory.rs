//! In-memory Metadata Store
//!
//! Same key layout and snapshot semantics as the sled store, kept in a
//! shared map. Clones share state, which lets a caller inspect a store
//! after handing it to a run. Writes can be made to fail after a given
//! number of successes.

use crate::error::StorageError;
use crate::store::{decode_info, decode_record, encode_info, encode_record, MetadataStore, INFO_KEY};
use crate::types::{
    DirectoryExpectationMap, DirectorySet, EntryKind, MetadataRecord, PathKey, SnapshotInfo,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    committed: BTreeMap<Vec<u8>, Vec<u8>>,
    pending: Option<BTreeMap<Vec<u8>, Vec<u8>>>,
    writes_before_failure: Option<usize>,
    close_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryMetadataStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write after `writes` successful ones.
    pub fn fail_writes_after(&self, writes: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.writes_before_failure = Some(writes);
        }
    }

    /// How many times [`MetadataStore::close`] was called on any clone.
    pub fn close_count(&self) -> usize {
        self.state.lock().map(|s| s.close_count).unwrap_or(0)
    }

    /// Committed entry keys and values, for equality checks.
    pub fn committed_entries(&self) -> Result<BTreeMap<Vec<u8>, Vec<u8>>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .committed
            .iter()
            .filter(|(k, _)| PathKey::decode(k).is_some())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Read("Memory store lock poisoned".to_string()))
    }

    fn write(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if let Some(remaining) = state.writes_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(StorageError::Write("write rejected".to_string()));
            }
            *remaining -= 1;
        }
        match state.pending.as_mut() {
            Some(pending) => {
                pending.insert(key, value);
            }
            None => {
                state.committed.insert(key, value);
            }
        }
        Ok(())
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn upsert_directories(&mut self, paths: &[&str]) -> Result<(), StorageError> {
        for path in paths {
            self.write(PathKey::directory(path).encode(), Vec::new())?;
        }
        Ok(())
    }

    fn upsert_file(
        &mut self,
        dir: &str,
        name: &str,
        record: &MetadataRecord,
    ) -> Result<(), StorageError> {
        let value = encode_record(record)?;
        self.write(PathKey::file(dir, name).encode(), value)
    }

    fn lookup_file(&self, dir: &str, name: &str) -> Result<Option<MetadataRecord>, StorageError> {
        let state = self.lock()?;
        match state.committed.get(&PathKey::file(dir, name).encode()) {
            Some(value) => Ok(Some(decode_record(value)?)),
            None => Ok(None),
        }
    }

    fn read_files_of(&self, dir: &str) -> Result<DirectoryExpectationMap, StorageError> {
        let state = self.lock()?;
        let prefix = PathKey::files_prefix(dir);
        let mut files = DirectoryExpectationMap::new();
        for (key, value) in state.committed.range(prefix.clone()..) {
            if !key.starts_with(&prefix) {
                break;
            }
            let key = PathKey::decode(key)
                .filter(|k| k.kind == EntryKind::File)
                .ok_or_else(|| StorageError::Corrupt(format!("Malformed file key under {:?}", dir)))?;
            files.insert(key.name, decode_record(value)?);
        }
        Ok(files)
    }

    fn read_all_directories(&self) -> Result<DirectorySet, StorageError> {
        let state = self.lock()?;
        Ok(state
            .committed
            .keys()
            .filter_map(|k| PathKey::decode(k))
            .filter(|k| k.kind == EntryKind::Directory)
            .map(|k| k.dir)
            .collect())
    }

    fn begin_snapshot(&mut self) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if state.pending.is_some() {
            return Err(StorageError::Write("A snapshot is already in progress".to_string()));
        }
        state.pending = Some(BTreeMap::new());
        Ok(())
    }

    fn commit_snapshot(&mut self, info: &SnapshotInfo) -> Result<(), StorageError> {
        let info = encode_info(info)?;
        let mut state = self.lock()?;
        let mut pending = state
            .pending
            .take()
            .ok_or_else(|| StorageError::Write("No snapshot in progress".to_string()))?;
        pending.insert(INFO_KEY.to_vec(), info);
        state.committed = pending;
        Ok(())
    }

    fn abort_snapshot(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.pending = None;
        }
    }

    fn snapshot_info(&self) -> Result<Option<SnapshotInfo>, StorageError> {
        let state = self.lock()?;
        match state.committed.get(INFO_KEY) {
            Some(value) => Ok(Some(decode_info(value)?)),
            None => Ok(None),
        }
    }

    fn close(mut self) -> Result<(), StorageError> {
        self.abort_snapshot();
        let mut state = self.lock()?;
        state.close_count += 1;
        Ok(())
    }
}
