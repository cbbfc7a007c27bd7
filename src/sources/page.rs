//! External references of world pages.
//!
//! Pages are binary containers read by an external program. The program is
//! invoked as `<reader> <args...> <page>` and prints the assets the page
//! references as JSON:
//!
//! ```json
//! {"python": {"xAgeSDLBoolShowHide.py": {"options": ["pfm"]}},
//!  "sfx": {"bird.ogg": {"options": ["sound_stream"]}}}
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::{Manifest, ManifestDocument};
use crate::util::process::{combined_output, ProcessBuilder};

/// Lists the assets referenced by one page.
pub trait PageReader: Send + Sync {
    fn read_externals(&self, page: &Path) -> Result<Manifest>;
}

/// Page reader backed by an external program.
#[derive(Debug, Clone)]
pub struct ExternalPageReader {
    program: PathBuf,
    args: Vec<String>,
}

impl ExternalPageReader {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        ExternalPageReader {
            program: program.into(),
            args,
        }
    }
}

impl PageReader for ExternalPageReader {
    fn read_externals(&self, page: &Path) -> Result<Manifest> {
        let cmd = ProcessBuilder::new(&self.program).args(&self.args).arg(page);
        tracing::trace!("Running: {}", cmd.display_command());
        let output = cmd.exec()?;
        if !output.status.success() {
            bail!(
                "page reader failed on '{}' ({})\n{}",
                page.display(),
                output.status,
                combined_output(&output).trim_end()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(Manifest::new());
        }
        let document: ManifestDocument = serde_json::from_str(&stdout)
            .with_context(|| format!("page reader returned invalid output for '{}'", page.display()))?;
        Ok(Manifest::from_document(document))
    }
}

/// Read the externals of a page.
///
/// Texture pages never reference anything and are not read at all.
pub fn scan_page(reader: &dyn PageReader, page: &Path) -> Result<Manifest> {
    let is_texture_page = page
        .file_name()
        .map(|name| name.to_string_lossy().ends_with("Textures.prp"))
        .unwrap_or(false);
    if is_texture_page {
        return Ok(Manifest::new());
    }
    reader.read_externals(page)
}
