use std::{
    fmt,
    io::{self, Read, Seek, SeekFrom},
};

use sha2::{Digest, Sha256};
use tracing::instrument;

pub const CHUNK_SIZE: usize = 8 * 1024;

/// SHA-256 of an image's raw bytes. Only ever used as a cache key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({self})")
    }
}

/// Hashes the whole stream in [`CHUNK_SIZE`] chunks and rewinds it to the start
/// afterwards so it can be decoded again.
#[instrument(level = "debug", skip(reader))]
pub fn digest<R: Read + Seek>(reader: &mut R) -> io::Result<ContentDigest> {
    reader.seek(SeekFrom::Start(0))?;

    let mut hasher = Sha256::new();
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&chunk[..read]);
    }

    reader.seek(SeekFrom::Start(0))?;
    Ok(ContentDigest(hasher.finalize().into()))
}
