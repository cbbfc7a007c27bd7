//! Detection of encrypted engine text files.
//!
//! The client can read `.age`, `.fni`, `.csv` and `.sdl` files wrapped in
//! one of several stream ciphers. The keys of some are configurable per
//! shard, so encrypted files cannot be read or repackaged here.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

/// Magic headers of the known encrypted stream formats.
const ENCRYPTION_MAGICS: [&[u8; 12]; 3] = [b"whatdoyousee", b"BriceIsSmart", b"notthedroids"];

/// Whether the file at `path` starts with an encryption header.
pub fn is_encrypted(path: &Path) -> Result<bool> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open file: {}", path.display()))?;
    let mut header = [0u8; 12];
    let mut filled = 0;
    while filled < header.len() {
        let n = file
            .read(&mut header[filled..])
            .with_context(|| format!("failed to read file: {}", path.display()))?;
        if n == 0 {
            return Ok(false);
        }
        filled += n;
    }
    Ok(ENCRYPTION_MAGICS.iter().any(|magic| &header == *magic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_detects_encrypted_headers() {
        let tmp = TempDir::new().unwrap();
        let encrypted = tmp.path().join("Garden.age");
        std::fs::write(&encrypted, b"whatdoyousee\x10\x00\x00\x00garbage").unwrap();
        let plain = tmp.path().join("Teledahn.age");
        std::fs::write(&plain, "StartDateTime=0000000000\n").unwrap();
        let short = tmp.path().join("tiny.sdl");
        std::fs::write(&short, "#").unwrap();

        assert!(is_encrypted(&encrypted).unwrap());
        assert!(!is_encrypted(&plain).unwrap());
        assert!(!is_encrypted(&short).unwrap());
    }
}
