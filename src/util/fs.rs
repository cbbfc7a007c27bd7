//! Filesystem utilities.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use glob::glob;
use walkdir::WalkDir;

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Find files matching a glob pattern relative to a base directory.
pub fn glob_files(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full_pattern = base.join(pattern);
    let pattern_str = full_pattern.to_string_lossy();

    let mut results = Vec::new();
    for entry in
        glob(&pattern_str).with_context(|| format!("invalid glob pattern: {}", pattern))?
    {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    results.push(path);
                }
            }
            Err(e) => {
                tracing::warn!("glob error: {}", e);
            }
        }
    }

    results.sort();
    results.dedup();
    Ok(results)
}

/// Regular files directly inside a directory, sorted.
///
/// A missing directory yields no files.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut results = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry =
            entry.with_context(|| format!("failed to read directory: {}", dir.display()))?;
        if entry.file_type().is_file() {
            results.push(entry.into_path());
        }
    }
    results.sort();
    Ok(results)
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Join path segments with backslashes, the separator used in manifests.
pub fn win_path_str<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .flat_map(|segment| {
            segment
                .as_ref()
                .split(['/', '\\'])
                .filter(|part| !part.is_empty() && *part != ".")
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>()
        .join("\\")
}

/// Convert a manifest path (either separator) to a native relative path.
pub fn native_path(manifest_path: &str) -> PathBuf {
    manifest_path
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect()
}

/// Convert a path to a forward-slash string, as used inside archives.
pub fn archive_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Size and modification time (seconds since the epoch) of a file.
pub fn file_stat(path: &Path) -> Result<(u64, i64)> {
    let metadata =
        fs::metadata(path).with_context(|| format!("failed to stat file: {}", path.display()))?;
    let modified = metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or(0);
    Ok((metadata.len(), modified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_glob_files() {
        let tmp = TempDir::new().unwrap();
        let sdl = tmp.path().join("SDL");
        fs::create_dir_all(&sdl).unwrap();
        fs::write(sdl.join("Garden.sdl"), "").unwrap();
        fs::write(sdl.join("Teledahn.sdl"), "").unwrap();
        fs::write(sdl.join("readme.txt"), "readme").unwrap();

        let files = glob_files(tmp.path(), "SDL/*.sdl").unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_list_files_skips_directories() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("dat")).unwrap();
        fs::write(tmp.path().join("plClient.exe"), "").unwrap();

        let files = list_files(tmp.path()).unwrap();
        assert_eq!(files, vec![tmp.path().join("plClient.exe")]);
        assert!(list_files(&tmp.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_win_path_str() {
        assert_eq!(win_path_str(["GameScripts", "ki/xKI.py"]), "GameScripts\\ki\\xKI.py");
        assert_eq!(win_path_str(["", "Garden", "contents.yml"]), "Garden\\contents.yml");
        assert_eq!(win_path_str([".", "GameData\\x.prp"]), "GameData\\x.prp");
    }

    #[test]
    fn test_native_and_archive_paths() {
        let path = native_path("GameAudio\\bird.ogg");
        assert_eq!(path, Path::new("GameAudio").join("bird.ogg"));
        assert_eq!(archive_path(&path), "GameAudio/bird.ogg");
    }

    #[test]
    fn test_file_stat() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.dat");
        fs::write(&path, "12345").unwrap();
        let (size, mtime) = file_stat(&path).unwrap();
        assert_eq!(size, 5);
        assert!(mtime > 0);
    }
}
