//! World (`.age`) descriptors.
//!
//! An age file is a list of `Key=Value` lines. Only two keys matter for
//! packaging: `SequencePrefix`, which decides whether the world ships a fog
//! (`.fni`) file, and `Page`, which names the pages of the world:
//!
//! ```text
//! StartDateTime=0000000000
//! DayLength=24.000000
//! SequencePrefix=5
//! Page=Garden,1
//! Page=ItinerantBugCloud,2,1
//! ```

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::sources::crypt::is_encrypted;

/// Pages every world has in addition to the ones it lists.
pub const COMMON_PAGES: &[&str] = &["Textures", "BuiltIn"];

#[derive(Debug, Error)]
pub enum AgeError {
    #[error("age file '{}' does not exist", path.display())]
    Missing { path: PathBuf },

    #[error("age file '{}' is encrypted and cannot be used for packaging", path.display())]
    Encrypted { path: PathBuf },

    #[error("failed to read age file '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}:{line}: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// One page listed by a world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub name: String,
    pub seq_suffix: u32,
}

/// Parsed world descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeInfo {
    pub name: String,
    pub seq_prefix: i32,
    pub pages: Vec<PageInfo>,
}

impl AgeInfo {
    /// Parse age file text. `name` is the world name (the file stem).
    pub fn parse(name: impl Into<String>, text: &str, origin: &Path) -> Result<Self, AgeError> {
        let mut info = AgeInfo {
            name: name.into(),
            seq_prefix: 0,
            pages: Vec::new(),
        };

        for (idx, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let malformed = |reason: String| AgeError::Malformed {
                path: origin.to_path_buf(),
                line: idx + 1,
                reason,
            };

            let Some((key, value)) = line.split_once('=') else {
                return Err(malformed(format!("expected `Key=Value`, found `{}`", line)));
            };
            match key.trim() {
                "SequencePrefix" => {
                    info.seq_prefix = value
                        .trim()
                        .parse()
                        .map_err(|_| malformed(format!("invalid sequence prefix `{}`", value)))?;
                }
                "Page" => {
                    let mut fields = value.split(',').map(str::trim);
                    let name = fields
                        .next()
                        .filter(|n| !n.is_empty())
                        .ok_or_else(|| malformed("page without a name".to_string()))?;
                    let seq_suffix = fields
                        .next()
                        .ok_or_else(|| malformed(format!("page `{}` has no sequence suffix", name)))?
                        .parse()
                        .map_err(|_| malformed(format!("page `{}` has an invalid sequence suffix", name)))?;
                    info.pages.push(PageInfo {
                        name: name.to_string(),
                        seq_suffix,
                    });
                }
                other => tracing::trace!("Ignoring age key {}", other),
            }
        }

        Ok(info)
    }

    /// Read an age file from disk.
    pub fn load(path: &Path) -> Result<Self, AgeError> {
        if !path.is_file() {
            return Err(AgeError::Missing {
                path: path.to_path_buf(),
            });
        }
        match is_encrypted(path) {
            Ok(true) => {
                return Err(AgeError::Encrypted {
                    path: path.to_path_buf(),
                })
            }
            Ok(false) => {}
            Err(e) => {
                return Err(AgeError::Read {
                    path: path.to_path_buf(),
                    source: io::Error::other(format!("{:#}", e)),
                })
            }
        }

        let text = std::fs::read_to_string(path).map_err(|source| AgeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        AgeInfo::parse(name, &text, path)
    }

    /// Whether the world ships a fog settings file.
    pub fn has_fog_file(&self) -> bool {
        self.seq_prefix > 0
    }

    pub fn age_file_name(&self) -> String {
        format!("{}.age", self.name)
    }

    pub fn fog_file_name(&self) -> String {
        format!("{}.fni", self.name)
    }

    /// File names of every page, listed pages first, then common pages.
    pub fn page_file_names(&self) -> Vec<String> {
        self.pages
            .iter()
            .map(|page| page.name.as_str())
            .chain(COMMON_PAGES.iter().copied())
            .map(|page| format!("{}_District_{}.prp", self.name, page))
            .collect()
    }
}
