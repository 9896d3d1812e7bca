//! Relative path handling and the file-name encoding boundary
//!
//! Relative paths are UTF-8, '/'-separated and rooted at "" regardless of
//! the host platform. Names coming off the filesystem are converted once,
//! here, by a [`NameCodec`] chosen at startup.

use crate::error::MirrorError;
use std::ffi::OsStr;
use std::path::Path;

/// Starts every escape sequence produced by the lossy codec.
const ESCAPE: char = '%';

/// Join a relative directory and an entry name.
///
/// The root directory is the empty string, so its children carry no
/// leading separator.
pub fn join_relative(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        let mut joined = String::with_capacity(dir.len() + 1 + name.len());
        joined.push_str(dir);
        joined.push('/');
        joined.push_str(name);
        joined
    }
}

/// Split a relative path into its parent directory and final name.
pub fn split_relative(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

/// Converts on-disk entry names into the canonical UTF-8 form used as
/// store keys.
///
/// The lossy codec is reversible: every `%` becomes `%25`, each byte of
/// an invalid UTF-8 sequence becomes `%XX` and, on Windows, each unpaired
/// surrogate becomes `%uXXXX`. Distinct on-disk names therefore never
/// share a key. A store must be built and verified with the same codec,
/// since names containing `%` are keyed differently by the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NameCodec {
    lossy: bool,
}

impl NameCodec {
    /// Reject names that are not valid UTF-8.
    pub fn strict() -> Self {
        Self { lossy: false }
    }

    /// Escape names that are not valid UTF-8 instead of rejecting them.
    pub fn lossy() -> Self {
        Self { lossy: true }
    }

    pub fn is_lossy(&self) -> bool {
        self.lossy
    }

    /// Decode one entry name. `path` is the full on-disk path, used for
    /// the error report.
    pub fn decode(&self, name: &OsStr, path: &Path) -> Result<String, MirrorError> {
        if self.lossy {
            return Ok(escape_name(name));
        }
        match name.to_str() {
            Some(s) => Ok(s.to_string()),
            None => Err(MirrorError::InvalidName {
                path: path.to_path_buf(),
            }),
        }
    }
}

fn push_escaped_str(out: &mut String, valid: &str) {
    for c in valid.chars() {
        if c == ESCAPE {
            out.push_str("%25");
        } else {
            out.push(c);
        }
    }
}

#[cfg(unix)]
fn escape_name(name: &OsStr) -> String {
    use std::fmt::Write;
    use std::os::unix::ffi::OsStrExt;

    let mut bytes = name.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                push_escaped_str(&mut out, valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                if let Ok(valid) = std::str::from_utf8(valid) {
                    push_escaped_str(&mut out, valid);
                }
                let invalid = e.error_len().unwrap_or(rest.len());
                for byte in &rest[..invalid] {
                    let _ = write!(out, "%{:02X}", byte);
                }
                bytes = &rest[invalid..];
            }
        }
    }
}

#[cfg(windows)]
fn escape_name(name: &OsStr) -> String {
    use std::fmt::Write;
    use std::os::windows::ffi::OsStrExt;

    let mut out = String::new();
    for unit in char::decode_utf16(name.encode_wide()) {
        match unit {
            Ok(c) if c == ESCAPE => out.push_str("%25"),
            Ok(c) => out.push(c),
            Err(e) => {
                let _ = write!(out, "%u{:04X}", e.unpaired_surrogate());
            }
        }
    }
    out
}

#[cfg(not(any(unix, windows)))]
fn escape_name(name: &OsStr) -> String {
    let mut out = String::new();
    push_escaped_str(&mut out, &name.to_string_lossy());
    out
}
