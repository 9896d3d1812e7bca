//! Console reporting of verification findings.
//!
//! Each finding is written as soon as the verifier reports it, so partial
//! output survives a later fatal error.

use crate::cli::parse::ReportFormat;
use crate::error::MirrorError;
use crate::snapshot::SnapshotSummary;
use crate::tree::hasher::DIGEST_ALGORITHM;
use crate::types::{format_millis, EntryKind, MetadataRecord};
use crate::verify::{FieldMismatch, Finding, MismatchHandler, VerifySummary};
use serde_json::json;
use std::io::{self, Write};

fn shown(path: &str) -> &str {
    if path.is_empty() {
        "."
    } else {
        path
    }
}

/// One-line text rendering of a finding.
pub fn render_text(finding: &Finding) -> String {
    match finding {
        Finding::NewFile { path } => {
            format!("New file found in the file system: '{}'", shown(path))
        }
        Finding::NewDirectory { path } => {
            format!("New directory found in the file system: '{}'", shown(path))
        }
        Finding::FileNotFound { path } => {
            format!("File not found in the file system: '{}'", shown(path))
        }
        Finding::DirectoryNotFound { path } => {
            format!("Directory not found in the file system: '{}'", shown(path))
        }
        Finding::TypeMismatch {
            path,
            expected,
            actual,
        } => format!(
            "Type mismatch for '{}': recorded {}, found {}",
            shown(path),
            expected,
            actual
        ),
        Finding::SizeMismatch {
            path,
            expected,
            actual,
        } => format!(
            "Size mismatch for '{}': recorded {} bytes, found {} bytes",
            shown(path),
            expected,
            actual
        ),
        Finding::ModifiedMismatch {
            path,
            expected,
            actual,
        } => format!(
            "Modification time mismatch for '{}': recorded {}, found {}",
            shown(path),
            format_millis(*expected),
            format_millis(*actual)
        ),
        Finding::DigestMismatch {
            path,
            expected,
            actual,
        } => format!(
            "Digest ({}) mismatch for '{}': recorded {}, found {}",
            DIGEST_ALGORITHM,
            shown(path),
            expected,
            actual
        ),
    }
}

/// [`MismatchHandler`] that writes findings to a stream.
///
/// Handler methods cannot fail, so the first write error is kept and
/// surfaced by [`ConsoleReporter::finish`]. Nothing more is written after
/// it.
pub struct ConsoleReporter<W: Write> {
    out: W,
    format: ReportFormat,
    error: Option<io::Error>,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, format: ReportFormat) -> Self {
        Self {
            out,
            format,
            error: None,
        }
    }

    fn emit(&mut self, finding: Finding) {
        if self.error.is_some() {
            return;
        }
        let line = match self.format {
            ReportFormat::Text => render_text(&finding),
            ReportFormat::Json => match serde_json::to_string(&finding) {
                Ok(line) => line,
                Err(e) => {
                    self.error = Some(io::Error::new(io::ErrorKind::Other, e));
                    return;
                }
            },
        };
        if let Err(e) = writeln!(self.out, "{}", line).and_then(|_| self.out.flush()) {
            self.error = Some(e);
        }
    }

    /// Write the closing summary line and report any earlier write failure.
    pub fn finish(mut self, summary: &VerifySummary) -> Result<W, MirrorError> {
        if let Some(e) = self.error.take() {
            return Err(MirrorError::Report(e));
        }
        let written = match self.format {
            ReportFormat::Text => writeln!(
                self.out,
                "Verified {} files in {} directories: {} findings",
                summary.files_checked, summary.directories_seen, summary.findings
            ),
            ReportFormat::Json => writeln!(self.out, "{}", json!({ "summary": summary })),
        };
        written
            .and_then(|_| self.out.flush())
            .map_err(MirrorError::Report)?;
        Ok(self.out)
    }
}

impl<W: Write> MismatchHandler for ConsoleReporter<W> {
    fn new_file_found(&mut self, path: &str) {
        self.emit(Finding::NewFile {
            path: path.to_string(),
        });
    }

    fn new_directory_found(&mut self, path: &str) {
        self.emit(Finding::NewDirectory {
            path: path.to_string(),
        });
    }

    fn file_not_found(&mut self, path: &str, _expected: &MetadataRecord) {
        self.emit(Finding::FileNotFound {
            path: path.to_string(),
        });
    }

    fn directory_not_found(&mut self, path: &str) {
        self.emit(Finding::DirectoryNotFound {
            path: path.to_string(),
        });
    }

    fn type_mismatch(&mut self, path: &str, expected: EntryKind, actual: EntryKind) {
        self.emit(Finding::TypeMismatch {
            path: path.to_string(),
            expected,
            actual,
        });
    }

    fn field_mismatch(&mut self, path: &str, mismatch: &FieldMismatch) {
        self.emit(Finding::from_field(path, mismatch));
    }
}

/// Summary line for a finished create-db run.
pub(crate) fn write_snapshot_summary<W: Write>(
    out: &mut W,
    summary: &SnapshotSummary,
) -> Result<(), MirrorError> {
    writeln!(
        out,
        "Snapshot created: {} directories, {} files, {} bytes ({} digests)",
        summary.directories, summary.files, summary.bytes, DIGEST_ALGORITHM
    )
    .and_then(|_| out.flush())
    .map_err(MirrorError::Report)
}
