//! Streaming content digests using BLAKE3
//!
//! File content is fed through the hasher in bounded chunks so memory use
//! does not depend on file size. The digest is the first 16 bytes of the
//! BLAKE3 extendable output, which makes it independent of chunk size.

use crate::types::{Digest, DIGEST_LEN};
use blake3::Hasher;
use std::io::{self, Read};

/// Name of the digest shown to operators. The digest is not an MD5 and
/// cannot be compared with `md5sum` output.
pub const DIGEST_ALGORITHM: &str = "blake3-128";

/// Chunk size used when none is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Incremental digest and byte counter for one stream.
pub struct DigestBuilder {
    hasher: Hasher,
    bytes: u64,
}

impl DigestBuilder {
    pub fn new() -> Self {
        Self {
            hasher: Hasher::new(),
            bytes: 0,
        }
    }

    /// Feed the next chunk of the stream.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Number of bytes fed so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Finish the stream, returning the byte count and the digest.
    pub fn finish(self) -> (u64, Digest) {
        let mut out = [0u8; DIGEST_LEN];
        self.hasher.finalize_xof().fill(&mut out);
        (self.bytes, Digest(out))
    }
}

impl Default for DigestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Digest a reader in chunks of `chunk_size` bytes.
///
/// A short read followed by end of stream is a normal finish. Any other
/// read error is returned as is.
pub fn digest_reader<R: Read>(reader: &mut R, chunk_size: usize) -> io::Result<(u64, Digest)> {
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut builder = DigestBuilder::new();

    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => builder.update(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(builder.finish())
}

/// Digest an in-memory buffer in one pass.
pub fn compute_digest(content: &[u8]) -> Digest {
    let mut builder = DigestBuilder::new();
    builder.update(content);
    builder.finish().1
}
