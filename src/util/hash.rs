//! Content digests for integrity metadata.
//!
//! Every packaged file carries two independent digests: a fast MD5 used for
//! quick change detection and a strong SHA-512 used for verification.
//! Files are read in fixed-size chunks so memory use does not grow with
//! file size.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha512};

const CHUNK_SIZE: usize = 1024 * 1024;

/// Which of the two digests to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashKind {
    /// MD5
    Fast,
    /// SHA-512
    Strong,
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashKind::Fast => write!(f, "md5"),
            HashKind::Strong => write!(f, "sha512"),
        }
    }
}

enum Hasher {
    Fast(md5::Context),
    Strong(Box<Sha512>),
}

impl Hasher {
    fn new(kind: HashKind) -> Self {
        match kind {
            HashKind::Fast => Hasher::Fast(md5::Context::new()),
            HashKind::Strong => Hasher::Strong(Box::new(Sha512::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Fast(ctx) => ctx.consume(data),
            Hasher::Strong(hasher) => hasher.update(data),
        }
    }

    fn finish(self) -> String {
        match self {
            Hasher::Fast(ctx) => hex::encode(ctx.compute().0),
            Hasher::Strong(hasher) => hex::encode(hasher.finalize()),
        }
    }
}

/// Compute one digest of a file as lowercase hex.
pub fn hash_file(path: &Path, kind: HashKind) -> Result<String> {
    let mut hasher = Hasher::new(kind);
    let mut file = File::open(path)
        .with_context(|| format!("failed to open file for hashing: {}", path.display()))?;
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .with_context(|| format!("failed to read file for hashing: {}", path.display()))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hasher.finish())
}

/// Compute one digest of a byte slice.
pub fn hash_bytes(data: &[u8], kind: HashKind) -> String {
    let mut hasher = Hasher::new(kind);
    hasher.update(data);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";
    const HELLO_SHA512: &str = "9b71d224bd62f3785d96d46ad3ea3d73319bfbc2890caadae2dff72519673ca7\
                                2323c3d99ba5c11d7c7acc6e14b8c5da0c4663475c2e5c3adef46f73bcdec043";

    #[test]
    fn test_hash_bytes() {
        assert_eq!(hash_bytes(b"hello", HashKind::Fast), HELLO_MD5);
        assert_eq!(hash_bytes(b"hello", HashKind::Strong), HELLO_SHA512);
    }

    #[test]
    fn test_hash_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.txt");
        std::fs::write(&path, "hello").unwrap();

        assert_eq!(hash_file(&path, HashKind::Fast).unwrap(), HELLO_MD5);
        assert_eq!(hash_file(&path, HashKind::Strong).unwrap(), HELLO_SHA512);
    }

    #[test]
    fn test_hash_file_spanning_chunks() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("big.bin");
        // Spans several chunks
        let data: Vec<u8> = (0..(CHUNK_SIZE * 2 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        for kind in [HashKind::Fast, HashKind::Strong] {
            assert_eq!(hash_file(&path, kind).unwrap(), hash_bytes(&data, kind));
        }
    }

    #[test]
    fn test_hash_missing_file() {
        let tmp = TempDir::new().unwrap();
        assert!(hash_file(&tmp.path().join("nope"), HashKind::Fast).is_err());
    }
}
