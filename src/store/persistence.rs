//! Persistence layer for the Metadata Store

use crate::error::StorageError;
use crate::store::{decode_info, decode_record, encode_info, encode_record, MetadataStore, INFO_KEY};
use crate::types::{
    DirectoryExpectationMap, DirectorySet, EntryKind, MetadataRecord, PathKey, SnapshotInfo,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Attempts made while another handle still holds the store's file lock.
const OPEN_ATTEMPTS: u32 = 40;
const OPEN_BACKOFF_START: Duration = Duration::from_millis(5);
const OPEN_BACKOFF_MAX: Duration = Duration::from_millis(200);

/// sled reports a held file lock as an io error naming the lock.
fn is_lock_contention(err: &sled::Error) -> bool {
    match err {
        sled::Error::Io(io) => {
            io.kind() == std::io::ErrorKind::WouldBlock
                || io.to_string().contains("could not acquire lock")
        }
        _ => false,
    }
}

/// Sled-based implementation of [`MetadataStore`]
pub struct SledMetadataStore {
    db: sled::Db,
    path: PathBuf,
    pending: Option<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl SledMetadataStore {
    /// Open (or create) a store at the given path
    ///
    /// The path is a directory; sled creates its files inside it. No
    /// background flusher is started, so the file lock is released as soon
    /// as the store is closed. A lock still held by a handle that is being
    /// torn down is waited for with a bounded backoff.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let config = sled::Config::new().path(&path).flush_every_ms(None);

        let mut delay = OPEN_BACKOFF_START;
        let mut attempt = 1;
        let db = loop {
            match config.open() {
                Ok(db) => break db,
                Err(e) if attempt < OPEN_ATTEMPTS && is_lock_contention(&e) => {
                    debug!(path = %path.display(), attempt, "Metadata store is locked, retrying");
                    thread::sleep(delay);
                    delay = (delay * 2).min(OPEN_BACKOFF_MAX);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(StorageError::Open {
                        path,
                        message: e.to_string(),
                    })
                }
            }
        };
        debug!(path = %path.display(), attempt, "Opened metadata store");
        Ok(Self {
            db,
            path,
            pending: None,
        })
    }

    /// Number of entry keys (files and directories) currently committed.
    pub fn entry_count(&self) -> Result<usize, StorageError> {
        let mut count = 0;
        for item in self.db.iter() {
            let (key, _) = item
                .map_err(|e| StorageError::Read(format!("Failed to iterate store: {}", e)))?;
            if PathKey::decode(&key).is_some() {
                count += 1;
            }
        }
        Ok(count)
    }

    fn write(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StorageError> {
        match self.pending.as_mut() {
            Some(pending) => {
                pending.insert(key, value);
            }
            None => {
                self.db
                    .insert(key, value)
                    .map_err(|e| StorageError::Write(format!("Failed to write entry: {}", e)))?;
            }
        }
        Ok(())
    }
}

impl MetadataStore for SledMetadataStore {
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
        let key = PathKey::file(dir, name).encode();
        match self
            .db
            .get(key)
            .map_err(|e| StorageError::Read(format!("Failed to get file record: {}", e)))?
        {
            Some(value) => Ok(Some(decode_record(&value)?)),
            None => Ok(None),
        }
    }

    fn read_files_of(&self, dir: &str) -> Result<DirectoryExpectationMap, StorageError> {
        let mut files = DirectoryExpectationMap::new();
        for item in self.db.scan_prefix(PathKey::files_prefix(dir)) {
            let (key, value) = item
                .map_err(|e| StorageError::Read(format!("Failed to read directory {:?}: {}", dir, e)))?;
            let key = PathKey::decode(&key)
                .filter(|k| k.kind == EntryKind::File)
                .ok_or_else(|| StorageError::Corrupt(format!("Malformed file key under {:?}", dir)))?;
            files.insert(key.name, decode_record(&value)?);
        }
        Ok(files)
    }

    fn read_all_directories(&self) -> Result<DirectorySet, StorageError> {
        let mut dirs = DirectorySet::new();
        for item in self.db.scan_prefix([b'D']) {
            let (key, _) = item
                .map_err(|e| StorageError::Read(format!("Failed to read directories: {}", e)))?;
            let key = PathKey::decode(&key)
                .ok_or_else(|| StorageError::Corrupt("Malformed directory key".to_string()))?;
            dirs.insert(key.dir);
        }
        Ok(dirs)
    }

    fn begin_snapshot(&mut self) -> Result<(), StorageError> {
        if self.pending.is_some() {
            return Err(StorageError::Write("A snapshot is already in progress".to_string()));
        }
        self.pending = Some(BTreeMap::new());
        Ok(())
    }

    fn commit_snapshot(&mut self, info: &SnapshotInfo) -> Result<(), StorageError> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| StorageError::Write("No snapshot in progress".to_string()))?;

        let mut batch = sled::Batch::default();
        let mut removed = 0usize;
        for item in self.db.iter() {
            let (key, _) = item
                .map_err(|e| StorageError::Read(format!("Failed to iterate store: {}", e)))?;
            if !pending.contains_key(&key[..]) {
                batch.remove(key);
                removed += 1;
            }
        }
        let written = pending.len();
        for (key, value) in pending {
            batch.insert(key, value);
        }
        batch.insert(INFO_KEY, encode_info(info)?);

        self.db
            .apply_batch(batch)
            .map_err(|e| StorageError::Write(format!("Failed to apply snapshot batch: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| StorageError::Write(format!("Failed to flush snapshot: {}", e)))?;

        debug!(written, removed, "Committed snapshot");
        Ok(())
    }

    fn abort_snapshot(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(discarded = pending.len(), "Aborted snapshot");
        }
    }

    fn snapshot_info(&self) -> Result<Option<SnapshotInfo>, StorageError> {
        match self
            .db
            .get(INFO_KEY)
            .map_err(|e| StorageError::Read(format!("Failed to get snapshot info: {}", e)))?
        {
            Some(value) => Ok(Some(decode_info(&value)?)),
            None => Ok(None),
        }
    }

    fn close(mut self) -> Result<(), StorageError> {
        self.abort_snapshot();
        self.db
            .flush()
            .map_err(|e| StorageError::Close(format!("Failed to flush database: {}", e)))?;
        let Self { db, path, .. } = self;
        drop(db);
        debug!(path = %path.display(), "Closed metadata store");
        Ok(())
    }
}
