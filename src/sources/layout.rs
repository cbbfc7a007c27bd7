//! On-disk layout of a client content tree.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::AssetCategory;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("content root '{}' does not exist", .0.display())]
    MissingContentRoot(PathBuf),

    #[error("scripts path '{}' does not exist", .0.display())]
    MissingScriptsRoot(PathBuf),
}

/// Where the files of each category live.
///
/// Script and state files may come from a separate scripts checkout. When
/// one is given it is searched first and the client tree is the fallback.
#[derive(Debug, Clone)]
pub struct ContentLayout {
    client_root: PathBuf,
    scripts_root: Option<PathBuf>,
}

impl ContentLayout {
    /// Validate the roots. Both must exist before any work starts.
    pub fn new(client_root: &Path, scripts_root: Option<&Path>) -> Result<Self, LayoutError> {
        if !client_root.is_dir() {
            return Err(LayoutError::MissingContentRoot(client_root.to_path_buf()));
        }
        if let Some(scripts) = scripts_root {
            if !scripts.is_dir() {
                return Err(LayoutError::MissingScriptsRoot(scripts.to_path_buf()));
            }
        }
        Ok(ContentLayout {
            client_root: client_root.to_path_buf(),
            scripts_root: scripts_root.map(Path::to_path_buf),
        })
    }

    pub fn client_root(&self) -> &Path {
        &self.client_root
    }

    /// Primary directory of a category.
    pub fn category_dir(&self, category: AssetCategory) -> PathBuf {
        match &self.scripts_root {
            Some(scripts) if category.supports_script_root() => {
                scripts.join(category.client_subdirectory())
            }
            _ => self.client_root.join(category.client_subdirectory()),
        }
    }

    /// Directories searched for a category, in order.
    pub fn search_dirs(&self, category: AssetCategory) -> Vec<PathBuf> {
        let client_dir = self.client_root.join(category.client_subdirectory());
        match &self.scripts_root {
            Some(scripts) if category.supports_script_root() => {
                vec![scripts.join(category.client_subdirectory()), client_dir]
            }
            _ => vec![client_dir],
        }
    }

    /// Resolve an asset to an existing file, if there is one.
    pub fn asset_path(&self, category: AssetCategory, filename: &str) -> Option<PathBuf> {
        let relative = crate::util::fs::native_path(filename);
        self.search_dirs(category)
            .into_iter()
            .map(|dir| dir.join(&relative))
            .find(|path| path.is_file())
    }

    /// Where an asset would be expected, for diagnostics.
    pub fn expected_path(&self, category: AssetCategory, filename: &str) -> PathBuf {
        self.category_dir(category)
            .join(crate::util::fs::native_path(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_roots_are_rejected() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            ContentLayout::new(&tmp.path().join("client"), None),
            Err(LayoutError::MissingContentRoot(_))
        ));
        assert!(matches!(
            ContentLayout::new(tmp.path(), Some(&tmp.path().join("scripts"))),
            Err(LayoutError::MissingScriptsRoot(_))
        ));
    }

    #[test]
    fn test_scripts_root_is_searched_first() {
        let tmp = TempDir::new().unwrap();
        let client = tmp.path().join("client");
        let scripts = tmp.path().join("scripts");
        fs::create_dir_all(client.join("Python")).unwrap();
        fs::create_dir_all(client.join("dat")).unwrap();
        fs::create_dir_all(scripts.join("Python")).unwrap();
        fs::write(client.join("Python").join("xFoo.py"), "client").unwrap();
        fs::write(client.join("Python").join("xOnlyClient.py"), "client").unwrap();
        fs::write(scripts.join("Python").join("xFoo.py"), "scripts").unwrap();
        fs::write(client.join("dat").join("Garden.age"), "").unwrap();

        let layout = ContentLayout::new(&client, Some(&scripts)).unwrap();
        assert_eq!(
            layout.asset_path(AssetCategory::Python, "xFoo.py"),
            Some(scripts.join("Python").join("xFoo.py"))
        );
        assert_eq!(
            layout.asset_path(AssetCategory::Python, "xOnlyClient.py"),
            Some(client.join("Python").join("xOnlyClient.py"))
        );
        assert_eq!(
            layout.asset_path(AssetCategory::Data, "Garden.age"),
            Some(client.join("dat").join("Garden.age"))
        );
        assert_eq!(layout.asset_path(AssetCategory::Data, "Nowhere.age"), None);
        assert_eq!(layout.category_dir(AssetCategory::Sdl), scripts.join("SDL"));
    }

    #[test]
    fn test_artifacts_live_in_the_client_root() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("extras")).unwrap();
        fs::write(tmp.path().join("extras").join("vcredist.exe"), "").unwrap();

        let layout = ContentLayout::new(tmp.path(), None).unwrap();
        assert_eq!(
            layout.asset_path(AssetCategory::Artifacts, "extras\\vcredist.exe"),
            Some(tmp.path().join("extras").join("vcredist.exe"))
        );
    }
}
