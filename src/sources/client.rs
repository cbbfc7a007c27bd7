//! Files belonging to the client itself rather than to any world.

use std::path::Path;

use anyhow::Result;

use crate::core::{AssetCategory, AssetKey, AssetRecord, Manifest};
use crate::sources::layout::ContentLayout;
use crate::util::fs::{archive_path, glob_files, list_files, relative_path};

/// Name of the package holding the client files.
pub const CLIENT_PACKAGE: &str = "Client";

/// Directory of redistributable installers next to the client.
pub const EXTRAS_DIR: &str = "extras";

/// Executables that make up the client, by lowercased file stem.
pub const KNOWN_EXECUTABLES: &[(&str, &str)] = &[
    ("plclient", "client"),
    ("uruexplorer", "client"),
    ("urulauncher", "launcher"),
    ("plurulauncher", "launcher"),
];

const VIDEO_EXTENSIONS: &[&str] = &["avi", "bik", "webm"];
const INTRO_VIDEOS: &[&str] = &["cyanworlds", "uruliveintro"];
const ENGINE_SCRIPT_DIRS: &[&str] = &["plasma", "system"];

/// Architecture tag for client binaries when none is configured.
pub fn default_client_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "i386",
        "aarch64" => "arm64",
        other => other,
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Describe one client binary or installer.
fn artifact_record(path: &Path, known_role: Option<&str>, arch: &str) -> AssetRecord {
    let mut record = AssetRecord::new();
    if let Some(role) = known_role {
        record.options.insert(role.to_string());
    }

    let extension = extension_of(path);
    match extension.as_str() {
        "cab" | "dll" | "exe" | "msi" => {
            if known_role.is_none() && matches!(extension.as_str(), "exe" | "msi") {
                record.options.insert("redist".to_string());
            }
            record.os = Some("win".to_string());
        }
        "" | "so" => record.os = Some("unix".to_string()),
        "app" | "dmg" => record.os = Some("mac".to_string()),
        _ => {}
    }
    record.arch = Some(arch.to_string());
    record
}

/// Binaries and installers in the client root and its `extras` directory.
///
/// Shortcuts are never packaged. Only files in the root can be known
/// client executables.
pub fn client_artifacts(layout: &ContentLayout, arch: &str) -> Result<Manifest> {
    let root = layout.client_root();
    let mut manifest = Manifest::new();

    let root_files = list_files(root)?.into_iter().map(|p| (p, true));
    let extras = list_files(&root.join(EXTRAS_DIR))?.into_iter().map(|p| (p, false));

    for (path, in_root) in root_files.chain(extras) {
        if extension_of(&path) == "lnk" {
            continue;
        }
        let stem = stem_of(&path);
        let known_role = if in_root {
            KNOWN_EXECUTABLES
                .iter()
                .find(|(name, _)| *name == stem)
                .map(|(_, role)| *role)
        } else {
            None
        };
        let filename = archive_path(&relative_path(root, &path));
        manifest.insert_or_merge(
            AssetKey::new(AssetCategory::Artifacts, filename),
            artifact_record(&path, known_role, arch),
        );
    }

    tracing::debug!("Found {} client artifact(s)", manifest.len());
    Ok(manifest)
}

/// Engine-level script modules, relative to the scripts directory.
pub fn engine_scripts(layout: &ContentLayout) -> Result<Vec<String>> {
    let python_dir = layout.category_dir(AssetCategory::Python);
    let mut scripts = Vec::new();
    for dir in ENGINE_SCRIPT_DIRS {
        for path in glob_files(&python_dir.join(dir), "*.py")? {
            scripts.push(archive_path(&relative_path(&python_dir, &path)));
        }
    }
    Ok(scripts)
}

/// Videos played while the client starts.
pub fn intro_videos(layout: &ContentLayout) -> Result<Vec<String>> {
    let avi_dir = layout.category_dir(AssetCategory::Avi);
    let mut videos = Vec::new();
    for path in list_files(&avi_dir)? {
        if !VIDEO_EXTENSIONS.contains(&extension_of(&path).as_str()) {
            continue;
        }
        let stem = stem_of(&path);
        if stem.starts_with("intro") || INTRO_VIDEOS.contains(&stem.as_str()) {
            videos.push(archive_path(&relative_path(&avi_dir, &path)));
        }
    }
    Ok(videos)
}
