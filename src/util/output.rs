//! Write targets for finished packages.
//!
//! A package is either written as a plain directory tree or streamed into a
//! single archive. The backend is picked from the shape of the destination
//! path:
//!
//! - `*.zip` → zip archive (deflate)
//! - `*.tar.gz`, `*.tgz` → gzip-compressed tarball
//! - anything else → directory
//!
//! Archives are closed when the sink is dropped, so an error halfway through
//! writing still leaves a well-formed (if incomplete) archive. Call
//! [`OutputSink::finish`] to flush and observe close errors.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::util::fs::{archive_path, ensure_dir};

/// A destination that package files are written into.
pub trait OutputSink {
    /// Copy the file at absolute `source` to the package-relative `dest`.
    fn copy_file(&mut self, source: &Path, dest: &Path) -> Result<()>;

    /// Write generated text at the package-relative `dest`.
    fn write_text(&mut self, dest: &Path, content: &str) -> Result<()>;

    /// Flush and close the sink.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Kind of sink a destination path selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Directory,
    Zip,
    TarGz,
}

impl SinkKind {
    /// Pick the backend for a destination path.
    pub fn for_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".zip") {
            SinkKind::Zip
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            SinkKind::TarGz
        } else {
            SinkKind::Directory
        }
    }
}

/// Open the sink selected by `destination`.
pub fn open_sink(destination: &Path) -> Result<Box<dyn OutputSink>> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }

    let sink: Box<dyn OutputSink> = match SinkKind::for_path(destination) {
        SinkKind::Directory => Box::new(DirectorySink::new(destination)),
        SinkKind::Zip => Box::new(ZipSink::create(destination)?),
        SinkKind::TarGz => Box::new(TarGzSink::create(destination)?),
    };
    tracing::debug!("Writing output to {}", destination.display());
    Ok(sink)
}

/// Writes files into a directory tree.
///
/// Parent directories are created on the first write into them.
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectorySink { root: root.into() }
    }

    fn fs_path(&self, dest: &Path) -> Result<PathBuf> {
        let path = self.root.join(dest);
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        Ok(path)
    }
}

impl OutputSink for DirectorySink {
    fn copy_file(&mut self, source: &Path, dest: &Path) -> Result<()> {
        let path = self.fs_path(dest)?;
        fs::copy(source, &path).with_context(|| {
            format!("failed to copy {} to {}", source.display(), path.display())
        })?;
        Ok(())
    }

    fn write_text(&mut self, dest: &Path, content: &str) -> Result<()> {
        let path = self.fs_path(dest)?;
        fs::write(&path, content)
            .with_context(|| format!("failed to write file: {}", path.display()))
    }

    fn finish(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Streams files into a zip archive.
pub struct ZipSink {
    path: PathBuf,
    writer: ZipWriter<File>,
}

impl ZipSink {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create archive: {}", path.display()))?;
        Ok(ZipSink {
            path: path.to_path_buf(),
            writer: ZipWriter::new(file),
        })
    }

    fn start(&mut self, dest: &Path) -> Result<()> {
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let name = archive_path(dest);
        self.writer
            .start_file(name.as_str(), options)
            .with_context(|| format!("failed to add '{}' to {}", name, self.path.display()))
    }
}

impl OutputSink for ZipSink {
    fn copy_file(&mut self, source: &Path, dest: &Path) -> Result<()> {
        let mut input = File::open(source)
            .with_context(|| format!("failed to open {}", source.display()))?;
        self.start(dest)?;
        io::copy(&mut input, &mut self.writer).with_context(|| {
            format!("failed to write {} into {}", source.display(), self.path.display())
        })?;
        Ok(())
    }

    fn write_text(&mut self, dest: &Path, content: &str) -> Result<()> {
        self.start(dest)?;
        self.writer
            .write_all(content.as_bytes())
            .with_context(|| format!("failed to write into {}", self.path.display()))
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.writer
            .finish()
            .with_context(|| format!("failed to finalize archive: {}", self.path.display()))?;
        Ok(())
    }
}

/// Streams files into a gzip-compressed tarball.
pub struct TarGzSink {
    path: PathBuf,
    builder: tar::Builder<GzEncoder<File>>,
}

impl TarGzSink {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create archive: {}", path.display()))?;
        let encoder = GzEncoder::new(file, Compression::default());
        Ok(TarGzSink {
            path: path.to_path_buf(),
            builder: tar::Builder::new(encoder),
        })
    }
}

impl OutputSink for TarGzSink {
    fn copy_file(&mut self, source: &Path, dest: &Path) -> Result<()> {
        let name = archive_path(dest);
        self.builder
            .append_path_with_name(source, &name)
            .with_context(|| {
                format!("failed to write {} into {}", source.display(), self.path.display())
            })
    }

    fn write_text(&mut self, dest: &Path, content: &str) -> Result<()> {
        let name = archive_path(dest);
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        );
        header.set_cksum();
        self.builder
            .append_data(&mut header, &name, content.as_bytes())
            .with_context(|| format!("failed to write '{}' into {}", name, self.path.display()))
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let path = self.path;
        let encoder = self
            .builder
            .into_inner()
            .with_context(|| format!("failed to finalize archive: {}", path.display()))?;
        encoder
            .finish()
            .with_context(|| format!("failed to finalize archive: {}", path.display()))?;
        Ok(())
    }
}

/// Sink that records what it is asked to write and triggers `interrupt`
/// once it has copied `after` files.
#[cfg(test)]
pub(crate) struct InterruptingSink {
    interrupt: crate::util::interrupt::Interrupt,
    after: usize,
    pub copies: usize,
    pub texts: Vec<PathBuf>,
}

#[cfg(test)]
impl InterruptingSink {
    pub fn new(interrupt: crate::util::interrupt::Interrupt, after: usize) -> Self {
        InterruptingSink {
            interrupt,
            after,
            copies: 0,
            texts: Vec::new(),
        }
    }
}

#[cfg(test)]
impl OutputSink for InterruptingSink {
    fn copy_file(&mut self, _source: &Path, _dest: &Path) -> Result<()> {
        self.copies += 1;
        if self.copies == self.after {
            self.interrupt.trigger();
        }
        Ok(())
    }

    fn write_text(&mut self, dest: &Path, _contents: &str) -> Result<()> {
        self.texts.push(dest.to_path_buf());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
