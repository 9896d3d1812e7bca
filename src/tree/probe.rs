//! Metadata probe: stat plus streamed digest for one path

use crate::error::MirrorError;
use crate::tree::hasher::digest_reader;
use crate::types::{Digest, MetadataRecord};
use std::fs::{self, File, Metadata};
use std::io::Read;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{trace, warn};

/// Produces [`MetadataRecord`]s for paths found by the scanner.
#[derive(Debug, Clone, Copy)]
pub struct MetadataProbe {
    chunk_size: usize,
}

impl MetadataProbe {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Probe one path.
    ///
    /// Directories get a record without size or digest. For files the
    /// size and modification time come from the filesystem; the byte count
    /// of the digest pass is only a cross-check. The file handle is dropped
    /// before any error leaves this function.
    pub fn probe(&self, path: &Path) -> Result<MetadataRecord, MirrorError> {
        let meta = fs::symlink_metadata(path).map_err(|source| MirrorError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        if meta.is_dir() {
            return Ok(MetadataRecord::directory(modified_millis(&meta)));
        }

        let mut file = File::open(path).map_err(|source| MirrorError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let meta = file.metadata().map_err(|source| MirrorError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let (bytes_read, digest) = self.read_digest(path, &mut file)?;

        if bytes_read != meta.len() {
            warn!(
                path = %path.display(),
                stat_size = meta.len(),
                bytes_read,
                "File size changed while it was being read"
            );
        }
        trace!(path = %path.display(), digest = %digest, "Probed file");

        Ok(MetadataRecord::file(meta.len(), modified_millis(&meta), digest))
    }

    fn read_digest<R: Read>(
        &self,
        path: &Path,
        reader: &mut R,
    ) -> Result<(u64, Digest), MirrorError> {
        digest_reader(reader, self.chunk_size).map_err(|source| MirrorError::Read {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for MetadataProbe {
    fn default() -> Self {
        Self::new(crate::tree::hasher::DEFAULT_CHUNK_SIZE)
    }
}

/// Modification time in whole milliseconds since the Unix epoch.
///
/// Times before the epoch are negative; a platform without modification
/// times yields 0.
pub fn modified_millis(meta: &Metadata) -> i64 {
    match meta.modified() {
        Ok(time) => system_time_millis(time),
        Err(_) => 0,
    }
}

fn system_time_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_millis() as i64,
        Err(before) => {
            let d = before.duration();
            // Floor toward negative infinity so sub-millisecond remainders
            // round the same way as positive times.
            let millis = d.as_millis() as i64;
            if d.subsec_nanos() % 1_000_000 == 0 {
                -millis
            } else {
                -millis - 1
            }
        }
    }
}
