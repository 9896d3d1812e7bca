//! Shared fixtures for integration tests

use mirror::error::MirrorError;
use mirror::snapshot::{create_db, SnapshotSummary};
use mirror::store::{with_store, SledMetadataStore};
use mirror::tree::probe::MetadataProbe;
use mirror::tree::scanner::TreeScanner;
use mirror::verify::{verify_dir, FindingCollector, VerifySummary};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A tree root and a store location inside one temporary directory.
pub struct Fixture {
    _temp: TempDir,
    pub root: PathBuf,
    pub db: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("tree");
        let db = temp.path().join("store");
        fs::create_dir(&root).unwrap();
        Self {
            _temp: temp,
            root,
            db,
        }
    }

    /// Write `content` at `rel`, creating parent directories.
    pub fn write(&self, rel: &str, content: &str) {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn mkdir(&self, rel: &str) {
        fs::create_dir_all(self.root.join(rel)).unwrap();
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn snapshot(&self) -> SnapshotSummary {
        snapshot_into(&self.root, &self.db).unwrap()
    }

    pub fn verify(&self) -> (VerifySummary, FindingCollector) {
        verify_from(&self.root, &self.db).unwrap()
    }
}

pub fn snapshot_into(root: &Path, db: &Path) -> Result<SnapshotSummary, MirrorError> {
    let store = SledMetadataStore::open(db)?;
    with_store(store, |store| {
        create_db(root, store, &TreeScanner::default(), MetadataProbe::default())
    })
}

pub fn verify_from(root: &Path, db: &Path) -> Result<(VerifySummary, FindingCollector), MirrorError> {
    let store = SledMetadataStore::open(db)?;
    let mut collector = FindingCollector::new();
    let summary = with_store(store, |store| {
        verify_dir(
            root,
            &*store,
            &mut collector,
            &TreeScanner::default(),
            MetadataProbe::default(),
        )
    })?;
    Ok((summary, collector))
}
