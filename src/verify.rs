//! Consistency Verifier
//!
//! Walks the live tree once and compares it against a snapshot. Each
//! directory's expected records are loaded when the directory is entered
//! and drained as its files are seen; whatever is left when the directory
//! is left was removed from the filesystem. Directories never entered are
//! reported once the walk is over.
//!
//! Mismatches are data, not errors. They go to a [`MismatchHandler`] the
//! moment they are found and never stop the walk.

use crate::error::MirrorError;
use crate::store::MetadataStore;
use crate::tree::path::{join_relative, split_relative};
use crate::tree::probe::MetadataProbe;
use crate::tree::scanner::{FoundFile, ScanObserver, TreeScanner};
use crate::types::{
    format_millis, Digest, DirectoryExpectationMap, DirectorySet, EntryKind, MetadataRecord,
};
use serde::{Serialize, Serializer};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// A field that differs between a recorded file and the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMismatch {
    Size { expected: u64, actual: u64 },
    Modified { expected_ms: i64, actual_ms: i64 },
    Digest { expected: Digest, actual: Digest },
}

/// Outcome of comparing an expected record with the live one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordComparison {
    Match,
    /// Kinds differ; no other field was compared.
    TypeMismatch {
        expected: EntryKind,
        actual: EntryKind,
    },
    /// Same kind; every differing field, in size, time, digest order.
    Fields(Vec<FieldMismatch>),
}

/// Compare two records.
///
/// A kind mismatch short-circuits. For files, size, modification time
/// (milliseconds) and digest are compared independently.
pub fn compare_records(expected: &MetadataRecord, actual: &MetadataRecord) -> RecordComparison {
    if expected.kind != actual.kind {
        return RecordComparison::TypeMismatch {
            expected: expected.kind,
            actual: actual.kind,
        };
    }
    if actual.kind != EntryKind::File {
        return RecordComparison::Match;
    }

    let mut fields = Vec::new();
    if expected.size != actual.size {
        fields.push(FieldMismatch::Size {
            expected: expected.size,
            actual: actual.size,
        });
    }
    if expected.modified_ms != actual.modified_ms {
        fields.push(FieldMismatch::Modified {
            expected_ms: expected.modified_ms,
            actual_ms: actual.modified_ms,
        });
    }
    if expected.digest != actual.digest {
        fields.push(FieldMismatch::Digest {
            expected: expected.digest,
            actual: actual.digest,
        });
    }

    if fields.is_empty() {
        RecordComparison::Match
    } else {
        RecordComparison::Fields(fields)
    }
}

/// Receives every divergence found by [`verify_dir`].
pub trait MismatchHandler {
    /// A file on disk has no record in the snapshot.
    fn new_file_found(&mut self, path: &str);
    /// A directory on disk is not in the snapshot.
    fn new_directory_found(&mut self, path: &str);
    /// A recorded file is gone from disk.
    fn file_not_found(&mut self, path: &str, expected: &MetadataRecord);
    /// A recorded directory is gone from disk.
    fn directory_not_found(&mut self, path: &str);
    fn type_mismatch(&mut self, path: &str, expected: EntryKind, actual: EntryKind);
    fn field_mismatch(&mut self, path: &str, mismatch: &FieldMismatch);
}

/// One reported divergence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "finding", rename_all = "snake_case")]
pub enum Finding {
    NewFile {
        path: String,
    },
    NewDirectory {
        path: String,
    },
    FileNotFound {
        path: String,
    },
    DirectoryNotFound {
        path: String,
    },
    TypeMismatch {
        path: String,
        expected: EntryKind,
        actual: EntryKind,
    },
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },
    ModifiedMismatch {
        path: String,
        #[serde(serialize_with = "serialize_millis")]
        expected: i64,
        #[serde(serialize_with = "serialize_millis")]
        actual: i64,
    },
    DigestMismatch {
        path: String,
        #[serde(serialize_with = "serialize_digest")]
        expected: Digest,
        #[serde(serialize_with = "serialize_digest")]
        actual: Digest,
    },
}

fn serialize_digest<S: Serializer>(digest: &Digest, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&digest.to_hex())
}

fn serialize_millis<S: Serializer>(millis: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_millis(*millis))
}

impl Finding {
    pub fn path(&self) -> &str {
        match self {
            Finding::NewFile { path }
            | Finding::NewDirectory { path }
            | Finding::FileNotFound { path }
            | Finding::DirectoryNotFound { path }
            | Finding::TypeMismatch { path, .. }
            | Finding::SizeMismatch { path, .. }
            | Finding::ModifiedMismatch { path, .. }
            | Finding::DigestMismatch { path, .. } => path,
        }
    }

    pub fn from_field(path: &str, mismatch: &FieldMismatch) -> Self {
        let path = path.to_string();
        match *mismatch {
            FieldMismatch::Size { expected, actual } => Finding::SizeMismatch {
                path,
                expected,
                actual,
            },
            FieldMismatch::Modified {
                expected_ms,
                actual_ms,
            } => Finding::ModifiedMismatch {
                path,
                expected: expected_ms,
                actual: actual_ms,
            },
            FieldMismatch::Digest { expected, actual } => Finding::DigestMismatch {
                path,
                expected,
                actual,
            },
        }
    }
}

/// Handler that keeps findings in discovery order.
#[derive(Debug, Default)]
pub struct FindingCollector {
    pub findings: Vec<Finding>,
}

impl FindingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }
}

impl MismatchHandler for FindingCollector {
    fn new_file_found(&mut self, path: &str) {
        self.findings.push(Finding::NewFile {
            path: path.to_string(),
        });
    }

    fn new_directory_found(&mut self, path: &str) {
        self.findings.push(Finding::NewDirectory {
            path: path.to_string(),
        });
    }

    fn file_not_found(&mut self, path: &str, _expected: &MetadataRecord) {
        self.findings.push(Finding::FileNotFound {
            path: path.to_string(),
        });
    }

    fn directory_not_found(&mut self, path: &str) {
        self.findings.push(Finding::DirectoryNotFound {
            path: path.to_string(),
        });
    }

    fn type_mismatch(&mut self, path: &str, expected: EntryKind, actual: EntryKind) {
        self.findings.push(Finding::TypeMismatch {
            path: path.to_string(),
            expected,
            actual,
        });
    }

    fn field_mismatch(&mut self, path: &str, mismatch: &FieldMismatch) {
        self.findings.push(Finding::from_field(path, mismatch));
    }
}

/// Counts for one verification run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerifySummary {
    pub files_checked: u64,
    pub directories_seen: u64,
    pub findings: u64,
}

impl VerifySummary {
    pub fn is_clean(&self) -> bool {
        self.findings == 0
    }
}

struct VerifyObserver<'a, S, H> {
    store: &'a S,
    handler: &'a mut H,
    probe: MetadataProbe,
    /// Snapshot directories not yet seen on disk.
    remaining_dirs: DirectorySet,
    /// Expectations of every directory currently open, innermost last.
    stack: Vec<DirectoryExpectationMap>,
    summary: VerifySummary,
}

impl<S: MetadataStore, H: MismatchHandler> ScanObserver for VerifyObserver<'_, S, H> {
    fn directory_entered(&mut self, rel_path: &str) -> Result<(), MirrorError> {
        self.summary.directories_seen += 1;

        // A file recorded under this name in the parent became a directory.
        let mut changed_type = false;
        if !rel_path.is_empty() {
            let (_, name) = split_relative(rel_path);
            if let Some(expected) = self.stack.last_mut().and_then(|m| m.remove(name)) {
                changed_type = true;
                if expected.kind != EntryKind::Directory {
                    self.summary.findings += 1;
                    self.handler
                        .type_mismatch(rel_path, expected.kind, EntryKind::Directory);
                }
            }
        }

        if !self.remaining_dirs.remove(rel_path) && !changed_type {
            self.summary.findings += 1;
            self.handler.new_directory_found(rel_path);
        }

        let expectations = self.store.read_files_of(rel_path)?;
        debug!(dir = rel_path, expected = expectations.len(), "Entered directory");
        self.stack.push(expectations);
        Ok(())
    }

    fn file_found(&mut self, file: &FoundFile<'_>) -> Result<(), MirrorError> {
        let rel_path = join_relative(file.rel_dir, file.name);
        debug!(path = %rel_path, "Checking file");

        let actual = self.probe.probe(file.path)?;
        self.summary.files_checked += 1;

        let expectations = self.stack.last_mut().ok_or_else(|| {
            MirrorError::Internal(format!("File {:?} reported outside any directory", rel_path))
        })?;

        match expectations.remove(file.name) {
            None => {
                self.summary.findings += 1;
                if self.remaining_dirs.remove(&rel_path) {
                    self.handler
                        .type_mismatch(&rel_path, EntryKind::Directory, actual.kind);
                } else {
                    self.handler.new_file_found(&rel_path);
                }
            }
            Some(expected) => match compare_records(&expected, &actual) {
                RecordComparison::Match => {}
                RecordComparison::TypeMismatch { expected, actual } => {
                    self.summary.findings += 1;
                    self.handler.type_mismatch(&rel_path, expected, actual);
                }
                RecordComparison::Fields(fields) => {
                    for field in &fields {
                        self.summary.findings += 1;
                        self.handler.field_mismatch(&rel_path, field);
                    }
                }
            },
        }
        Ok(())
    }

    fn directory_left(&mut self, rel_path: &str) -> Result<(), MirrorError> {
        let leftover = self.stack.pop().ok_or_else(|| {
            MirrorError::Internal(format!("Directory {:?} left but never entered", rel_path))
        })?;

        let mut missing: Vec<_> = leftover.into_iter().collect();
        missing.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, expected) in missing {
            self.summary.findings += 1;
            self.handler
                .file_not_found(&join_relative(rel_path, &name), &expected);
        }
        Ok(())
    }
}

/// Verify the tree at `root` against the snapshot in `store`.
///
/// Every divergence goes to `handler` as soon as it is found. Only
/// scanner, probe and store failures end the run early.
#[instrument(skip(store, handler, scanner, probe), fields(root = %root.display()))]
pub fn verify_dir<S: MetadataStore, H: MismatchHandler>(
    root: &Path,
    store: &S,
    handler: &mut H,
    scanner: &TreeScanner,
    probe: MetadataProbe,
) -> Result<VerifySummary, MirrorError> {
    let start = Instant::now();
    match store.snapshot_info()? {
        Some(snapshot) => info!(
            recorded_root = %snapshot.root,
            created_at = %snapshot.created_at.to_rfc3339(),
            files = snapshot.files,
            directories = snapshot.directories,
            "Verifying against snapshot"
        ),
        None => info!("Verifying against a store without snapshot info"),
    }

    let mut observer = VerifyObserver {
        store,
        handler,
        probe,
        remaining_dirs: store.read_all_directories()?,
        stack: Vec::new(),
        summary: VerifySummary::default(),
    };

    scanner.scan(root, &mut observer)?;

    if !observer.stack.is_empty() {
        return Err(MirrorError::Internal(format!(
            "{} directories still open after the scan",
            observer.stack.len()
        )));
    }

    let missing_dirs = std::mem::take(&mut observer.remaining_dirs);
    for dir in &missing_dirs {
        observer.summary.findings += 1;
        observer.handler.directory_not_found(dir);
    }

    let summary = observer.summary;
    info!(
        files_checked = summary.files_checked,
        directories_seen = summary.directories_seen,
        findings = summary.findings,
        duration_ms = start.elapsed().as_millis() as u64,
        "Verification finished"
    );
    Ok(summary)
}
