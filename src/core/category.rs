//! Asset categories and their fixed directory layouts.
//!
//! Every category maps to exactly one subdirectory of the content root
//! (where the client keeps the file) and one subdirectory of a package
//! (where the file is written). Both tables are part of the package
//! contract and must not drift.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A category of asset, as it appears at the top level of a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum AssetCategory {
    /// Client executables, libraries and redistributables
    Artifacts,
    /// Videos
    Avi,
    /// World descriptors, pages and other binary data
    Data,
    /// Script modules
    Python,
    /// State descriptors
    Sdl,
    /// Audio buffers
    Sfx,
}

impl AssetCategory {
    /// All categories, in manifest order.
    pub const ALL: [AssetCategory; 6] = [
        AssetCategory::Artifacts,
        AssetCategory::Avi,
        AssetCategory::Data,
        AssetCategory::Python,
        AssetCategory::Sdl,
        AssetCategory::Sfx,
    ];

    /// Name used in manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Artifacts => "artifacts",
            AssetCategory::Avi => "avi",
            AssetCategory::Data => "data",
            AssetCategory::Python => "python",
            AssetCategory::Sdl => "sdl",
            AssetCategory::Sfx => "sfx",
        }
    }

    /// Subdirectory of the content root holding this category.
    ///
    /// Artifacts live directly in the content root.
    pub fn client_subdirectory(&self) -> &'static str {
        match self {
            AssetCategory::Artifacts => "",
            AssetCategory::Avi => "avi",
            AssetCategory::Data => "dat",
            AssetCategory::Python => "Python",
            AssetCategory::Sdl => "SDL",
            AssetCategory::Sfx => "sfx",
        }
    }

    /// Subdirectory of a package holding this category.
    pub fn package_subdirectory(&self) -> &'static str {
        match self {
            AssetCategory::Artifacts => "Client",
            AssetCategory::Avi => "GameVideos",
            AssetCategory::Data => "GameData",
            AssetCategory::Python => "GameScripts",
            AssetCategory::Sdl => "GameState",
            AssetCategory::Sfx => "GameAudio",
        }
    }

    /// Whether files of this category may come from a separate script root.
    ///
    /// World data (`.age`, `.fni`, `.csv`) is tied to the client build, so
    /// only scripts and state descriptors are looked up in the script root.
    pub fn supports_script_root(&self) -> bool {
        matches!(self, AssetCategory::Python | AssetCategory::Sdl)
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "artifacts" => Ok(AssetCategory::Artifacts),
            "avi" => Ok(AssetCategory::Avi),
            "data" => Ok(AssetCategory::Data),
            "python" => Ok(AssetCategory::Python),
            "sdl" => Ok(AssetCategory::Sdl),
            "sfx" => Ok(AssetCategory::Sfx),
            _ => Err(format!("unknown asset category '{}'", s)),
        }
    }
}

impl TryFrom<String> for AssetCategory {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subdirectory_tables() {
        let client: Vec<_> = AssetCategory::ALL
            .iter()
            .map(|c| c.client_subdirectory())
            .collect();
        assert_eq!(client, ["", "avi", "dat", "Python", "SDL", "sfx"]);

        let package: Vec<_> = AssetCategory::ALL
            .iter()
            .map(|c| c.package_subdirectory())
            .collect();
        assert_eq!(
            package,
            ["Client", "GameVideos", "GameData", "GameScripts", "GameState", "GameAudio"]
        );
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("SFX".parse::<AssetCategory>().unwrap(), AssetCategory::Sfx);
        assert_eq!("python".parse::<AssetCategory>().unwrap(), AssetCategory::Python);
        assert!("textures".parse::<AssetCategory>().is_err());
    }

    #[test]
    fn test_script_root_categories() {
        assert!(AssetCategory::Python.supports_script_root());
        assert!(AssetCategory::Sdl.supports_script_root());
        assert!(!AssetCategory::Data.supports_script_root());
    }
}
