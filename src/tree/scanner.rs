//! Depth-first directory scanner emitting nested traversal events
//!
//! Every directory that can be opened produces exactly one
//! `directory_entered`/`directory_left` pair, and every event for its
//! descendants falls between the two. Sibling order is whatever the
//! filesystem yields.

use crate::error::MirrorError;
use crate::tree::path::{join_relative, NameCodec};
use std::fs::{self, ReadDir};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// A regular file reported by the scanner.
#[derive(Debug, Clone, Copy)]
pub struct FoundFile<'a> {
    /// On-disk path of the file.
    pub path: &'a Path,
    /// On-disk path of the directory holding the file.
    pub dir: &'a Path,
    /// Relative path of that directory ("" for the root).
    pub rel_dir: &'a str,
    /// Canonical entry name.
    pub name: &'a str,
}

/// Receives traversal events from [`TreeScanner`].
///
/// Returning an error from any callback aborts the scan; open directory
/// handles are released before the error reaches the caller.
pub trait ScanObserver {
    fn directory_entered(&mut self, rel_path: &str) -> Result<(), MirrorError>;
    fn file_found(&mut self, file: &FoundFile<'_>) -> Result<(), MirrorError>;
    fn directory_left(&mut self, rel_path: &str) -> Result<(), MirrorError>;
}

/// Counters for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub directories: u64,
    pub files: u64,
    pub denied: u64,
    pub skipped: u64,
}

/// One open directory on the traversal stack.
struct Frame {
    entries: ReadDir,
    path: PathBuf,
    rel: String,
}

/// Single-pass directory walker
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeScanner {
    codec: NameCodec,
}

impl TreeScanner {
    pub fn new(codec: NameCodec) -> Self {
        Self { codec }
    }

    /// Scan `root`, reporting it as the relative path "".
    pub fn scan<O: ScanObserver>(
        &self,
        root: &Path,
        observer: &mut O,
    ) -> Result<ScanStats, MirrorError> {
        self.scan_from(root, "", observer)
    }

    /// Scan the directory at `path`, whose relative path is `rel_path`.
    ///
    /// The traversal keeps an explicit stack of open directories, so depth
    /// is bounded by memory rather than by the call stack.
    #[instrument(skip(self, observer), fields(root = %path.display()))]
    pub fn scan_from<O: ScanObserver>(
        &self,
        path: &Path,
        rel_path: &str,
        observer: &mut O,
    ) -> Result<ScanStats, MirrorError> {
        let mut stats = ScanStats::default();
        let mut stack: Vec<Frame> = Vec::new();

        if let Some(frame) = enter(path.to_path_buf(), rel_path.to_string(), observer, &mut stats)? {
            stack.push(frame);
        }

        loop {
            let next = match stack.last_mut() {
                Some(frame) => frame.entries.next(),
                None => break,
            };

            let entry = match next {
                None => {
                    if let Some(Frame { entries, rel, .. }) = stack.pop() {
                        // Release the handle before announcing the exit.
                        drop(entries);
                        observer.directory_left(&rel)?;
                    }
                    continue;
                }
                Some(Err(source)) => {
                    let path = stack.last().map(|f| f.path.clone()).unwrap_or_default();
                    return Err(MirrorError::Scan { path, source });
                }
                Some(Ok(entry)) => entry,
            };

            let file_name = entry.file_name();
            if file_name == "." || file_name == ".." {
                continue;
            }
            let entry_path = entry.path();

            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(e) => {
                    warn!(path = %entry_path.display(), error = %e, "Unable to determine entry type, skipping it");
                    stats.skipped += 1;
                    continue;
                }
            };

            let child = {
                let Some(frame) = stack.last() else { break };
                if file_type.is_file() {
                    let name = self.codec.decode(&file_name, &entry_path)?;
                    stats.files += 1;
                    observer.file_found(&FoundFile {
                        path: &entry_path,
                        dir: &frame.path,
                        rel_dir: &frame.rel,
                        name: &name,
                    })?;
                    None
                } else if file_type.is_dir() {
                    let name = self.codec.decode(&file_name, &entry_path)?;
                    let child_rel = join_relative(&frame.rel, &name);
                    enter(entry_path, child_rel, observer, &mut stats)?
                } else {
                    warn!(
                        path = %entry_path.display(),
                        "Neither a directory nor a regular file, skipping it"
                    );
                    stats.skipped += 1;
                    None
                }
            };

            if let Some(frame) = child {
                stack.push(frame);
            }
        }

        debug!(
            directories = stats.directories,
            files = stats.files,
            denied = stats.denied,
            skipped = stats.skipped,
            "Scan finished"
        );
        Ok(stats)
    }
}

/// Open a directory and announce it. Access-denied directories yield
/// `None` and no events.
fn enter<O: ScanObserver>(
    path: PathBuf,
    rel: String,
    observer: &mut O,
    stats: &mut ScanStats,
) -> Result<Option<Frame>, MirrorError> {
    debug!(path = %path.display(), "Scanning directory");

    let entries = match fs::read_dir(&path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            warn!(path = %path.display(), "No access to directory, skipping it");
            stats.denied += 1;
            return Ok(None);
        }
        Err(source) => return Err(MirrorError::Scan { path, source }),
    };

    observer.directory_entered(&rel)?;
    stats.directories += 1;
    Ok(Some(Frame { entries, path, rel }))
}
