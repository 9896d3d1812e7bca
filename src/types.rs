//! Core types shared by the scanner, the store and the verifier.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Length of a content digest in bytes.
pub const DIGEST_LEN: usize = 16;

/// Kind of a filesystem entry tracked by a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    fn tag(self) -> u8 {
        match self {
            EntryKind::File => b'F',
            EntryKind::Directory => b'D',
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => f.write_str("file"),
            EntryKind::Directory => f.write_str("directory"),
        }
    }
}

/// 16-byte content digest of a file.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Digest(pub [u8; DIGEST_LEN]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

/// Metadata recorded for one filesystem entry.
///
/// `size` and `digest` are only meaningful for files; directories carry
/// zero values. Records are never edited in place, a changed entry gets a
/// fresh record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub kind: EntryKind,
    pub size: u64,
    /// Modification time in milliseconds since the Unix epoch.
    pub modified_ms: i64,
    pub digest: Digest,
}

impl MetadataRecord {
    pub fn file(size: u64, modified_ms: i64, digest: Digest) -> Self {
        Self {
            kind: EntryKind::File,
            size,
            modified_ms,
            digest,
        }
    }

    pub fn directory(modified_ms: i64) -> Self {
        Self {
            kind: EntryKind::Directory,
            size: 0,
            modified_ms,
            digest: Digest::default(),
        }
    }
}

/// Render epoch milliseconds as an RFC 3339 UTC timestamp.
pub fn format_millis(millis: i64) -> String {
    match chrono::DateTime::<chrono::Utc>::from_timestamp_millis(millis) {
        Some(ts) => ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        None => format!("{}ms", millis),
    }
}

/// Store key for one entry: a kind plus a relative location.
///
/// Directory keys hold the full relative path in `dir` and an empty
/// `name`. File keys hold the parent directory and the file name. The
/// encoded form is byte-exact and case-sensitive; the same bytes under a
/// different kind form a different key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathKey {
    pub kind: EntryKind,
    pub dir: String,
    pub name: String,
}

const NAME_SEPARATOR: u8 = 0;

impl PathKey {
    pub fn directory(path: &str) -> Self {
        Self {
            kind: EntryKind::Directory,
            dir: path.to_string(),
            name: String::new(),
        }
    }

    pub fn file(dir: &str, name: &str) -> Self {
        Self {
            kind: EntryKind::File,
            dir: dir.to_string(),
            name: name.to_string(),
        }
    }

    /// Encode as `D<path>` or `F<dir>\0<name>`.
    pub fn encode(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(2 + self.dir.len() + self.name.len());
        key.push(self.kind.tag());
        key.extend_from_slice(self.dir.as_bytes());
        if self.kind == EntryKind::File {
            key.push(NAME_SEPARATOR);
            key.extend_from_slice(self.name.as_bytes());
        }
        key
    }

    /// Prefix shared by every file key directly inside `dir`.
    pub fn files_prefix(dir: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(2 + dir.len());
        prefix.push(EntryKind::File.tag());
        prefix.extend_from_slice(dir.as_bytes());
        prefix.push(NAME_SEPARATOR);
        prefix
    }

    /// Decode a key produced by [`PathKey::encode`].
    ///
    /// Returns `None` for keys that are not entry keys or are not UTF-8.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let (&tag, rest) = bytes.split_first()?;
        match tag {
            b'D' => {
                let path = std::str::from_utf8(rest).ok()?;
                Some(Self::directory(path))
            }
            b'F' => {
                let split = rest.iter().position(|&b| b == NAME_SEPARATOR)?;
                let dir = std::str::from_utf8(&rest[..split]).ok()?;
                let name = std::str::from_utf8(&rest[split + 1..]).ok()?;
                Some(Self::file(dir, name))
            }
            _ => None,
        }
    }
}

/// Relative paths of every directory known to a snapshot. Root is "".
pub type DirectorySet = BTreeSet<String>;

/// Expected records for the entries directly inside one directory, keyed
/// by entry name.
pub type DirectoryExpectationMap = HashMap<String, MetadataRecord>;

/// Summary recorded alongside a committed snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub root: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub files: u64,
    pub directories: u64,
}
