//! Snapshot Builder
//!
//! Records every directory and file under a root into a
//! [`MetadataStore`] as one atomic snapshot.

use crate::error::MirrorError;
use crate::store::MetadataStore;
use crate::tree::probe::MetadataProbe;
use crate::tree::scanner::{FoundFile, ScanObserver, TreeScanner};
use crate::types::SnapshotInfo;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Counts for one snapshot build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub directories: u64,
    pub files: u64,
    pub bytes: u64,
}

struct SnapshotObserver<'a, S> {
    store: &'a mut S,
    probe: MetadataProbe,
    summary: SnapshotSummary,
}

impl<S: MetadataStore> ScanObserver for SnapshotObserver<'_, S> {
    fn directory_entered(&mut self, rel_path: &str) -> Result<(), MirrorError> {
        self.store.upsert_directories(&[rel_path])?;
        self.summary.directories += 1;
        Ok(())
    }

    fn file_found(&mut self, file: &FoundFile<'_>) -> Result<(), MirrorError> {
        let record = self.probe.probe(file.path)?;
        debug!(dir = file.rel_dir, name = file.name, size = record.size, "Recorded file");
        self.store.upsert_file(file.rel_dir, file.name, &record)?;
        self.summary.files += 1;
        self.summary.bytes += record.size;
        Ok(())
    }

    fn directory_left(&mut self, _rel_path: &str) -> Result<(), MirrorError> {
        Ok(())
    }
}

/// Build a snapshot of `root` into `store`.
///
/// All writes go into a single store snapshot that replaces whatever was
/// recorded before. On error the snapshot is aborted and the previous
/// state is left as it was; closing the store is the caller's job (see
/// [`crate::store::with_store`]).
#[instrument(skip(store, scanner, probe), fields(root = %root.display()))]
pub fn create_db<S: MetadataStore>(
    root: &Path,
    store: &mut S,
    scanner: &TreeScanner,
    probe: MetadataProbe,
) -> Result<SnapshotSummary, MirrorError> {
    let start = Instant::now();
    info!("Creating snapshot");

    store.begin_snapshot()?;

    let mut observer = SnapshotObserver {
        store: &mut *store,
        probe,
        summary: SnapshotSummary::default(),
    };
    let scanned = scanner.scan(root, &mut observer);
    let summary = observer.summary;

    if let Err(e) = scanned {
        store.abort_snapshot();
        return Err(e);
    }

    let info = SnapshotInfo {
        root: root.display().to_string(),
        created_at: chrono::Utc::now(),
        files: summary.files,
        directories: summary.directories,
    };
    store.commit_snapshot(&info)?;

    info!(
        directories = summary.directories,
        files = summary.files,
        bytes = summary.bytes,
        duration_ms = start.elapsed().as_millis() as u64,
        "Snapshot created"
    );
    Ok(summary)
}
