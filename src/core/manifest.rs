//! Package manifests and their YAML text form.
//!
//! On disk a manifest is a mapping of category name to a mapping of
//! filename to asset attributes:
//!
//! ```yaml
//! data:
//!   Garden.age:
//!     source: GameData\Garden.age
//!     dataset: base
//!     size: 512
//! sfx:
//!   bird.ogg:
//!     options: [sound_stream]
//! ```
//!
//! A bundle split into subpackages additionally carries an index listing
//! every subpackage and the location of its manifest.

use std::collections::btree_map::{self, BTreeMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::asset::{AssetKey, AssetRecord};
use crate::core::category::AssetCategory;

/// File name of a package manifest.
pub const MANIFEST_FILE_NAME: &str = "contents.yml";

/// Errors reading or writing manifests.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("package '{package}' {reason}")]
    MalformedPackage { package: String, reason: String },

    #[error("failed to read manifest '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest '{path}'")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to serialize manifest")]
    Serialize(#[source] serde_yaml::Error),
}

/// Nested category/filename form of a manifest, as it is written.
pub type ManifestDocument = BTreeMap<AssetCategory, BTreeMap<String, AssetRecord>>;

/// A set of assets with unique keys.
///
/// Categories are implicit: a category with no assets simply does not
/// appear when the manifest is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    assets: BTreeMap<AssetKey, AssetRecord>,
}

impl Manifest {
    pub fn new() -> Self {
        Manifest::default()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, key: &AssetKey) -> Option<&AssetRecord> {
        self.assets.get(key)
    }

    pub fn get_mut(&mut self, key: &AssetKey) -> Option<&mut AssetRecord> {
        self.assets.get_mut(key)
    }

    /// Look up an asset by category and filename.
    pub fn find(&self, category: AssetCategory, filename: &str) -> Option<&AssetRecord> {
        self.assets.get(&AssetKey::new(category, filename))
    }

    /// Insert a record, replacing any existing record for the key.
    pub fn insert(&mut self, key: AssetKey, record: AssetRecord) -> Option<AssetRecord> {
        self.assets.insert(key, record)
    }

    /// Insert a stub record unless the key is already present.
    pub fn insert_stub(&mut self, category: AssetCategory, filename: impl Into<String>) {
        self.assets
            .entry(AssetKey::new(category, filename))
            .or_default();
    }

    /// Insert a record, or union its options into the existing record.
    ///
    /// The first record inserted for a key keeps all of its other fields.
    pub fn insert_or_merge(&mut self, key: AssetKey, record: AssetRecord) {
        match self.assets.entry(key) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(record);
            }
            btree_map::Entry::Occupied(mut entry) => {
                entry.get_mut().merge_options(&record);
            }
        }
    }

    pub fn remove(&mut self, key: &AssetKey) -> Option<AssetRecord> {
        self.assets.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetKey, &AssetRecord)> {
        self.assets.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&AssetKey, &mut AssetRecord)> {
        self.assets.iter_mut()
    }

    /// Assets of a single category.
    pub fn category(
        &self,
        category: AssetCategory,
    ) -> impl Iterator<Item = (&AssetKey, &AssetRecord)> {
        self.assets
            .iter()
            .filter(move |(key, _)| key.category() == category)
    }

    /// Number of assets in a category.
    pub fn category_len(&self, category: AssetCategory) -> usize {
        self.category(category).count()
    }

    /// Convert to the nested form written to disk.
    pub fn to_document(&self) -> ManifestDocument {
        let mut document = ManifestDocument::new();
        for (key, record) in &self.assets {
            document
                .entry(key.category())
                .or_default()
                .insert(key.filename().to_string(), record.clone());
        }
        document
    }

    /// Build a manifest from its nested form.
    ///
    /// Filenames differing only in case are collapsed, unioning their tags.
    pub fn from_document(document: ManifestDocument) -> Self {
        let mut manifest = Manifest::new();
        for (category, assets) in document {
            for (filename, record) in assets {
                manifest.insert_or_merge(AssetKey::new(category, filename), record);
            }
        }
        manifest
    }

    /// Render the manifest as YAML.
    pub fn to_yaml(&self) -> Result<String, ManifestError> {
        serde_yaml::to_string(&self.to_document()).map_err(ManifestError::Serialize)
    }

    /// Parse a manifest from YAML.
    pub fn from_yaml(text: &str, origin: &str) -> Result<Self, ManifestError> {
        let document: ManifestDocument =
            serde_yaml::from_str(text).map_err(|source| ManifestError::Parse {
                path: origin.to_string(),
                source,
            })?;
        Ok(Manifest::from_document(document))
    }
}

impl FromIterator<(AssetKey, AssetRecord)> for Manifest {
    fn from_iter<T: IntoIterator<Item = (AssetKey, AssetRecord)>>(iter: T) -> Self {
        let mut manifest = Manifest::new();
        for (key, record) in iter {
            manifest.insert_or_merge(key, record);
        }
        manifest
    }
}

impl IntoIterator for Manifest {
    type Item = (AssetKey, AssetRecord);
    type IntoIter = btree_map::IntoIter<AssetKey, AssetRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.assets.into_iter()
    }
}

/// Reference to a subpackage manifest from a bundle index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubpackageRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl SubpackageRef {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        SubpackageRef {
            name: Some(name.into()),
            source: Some(source.into()),
        }
    }
}

/// A manifest file as read from disk: an optional subpackage index plus
/// any assets declared directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageDocument {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subpackages: Vec<SubpackageRef>,

    #[serde(flatten)]
    pub assets: ManifestDocument,
}

impl PackageDocument {
    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    pub fn parse(text: &str, origin: &str) -> Result<Self, ManifestError> {
        // An empty file is an empty package.
        if text.trim().is_empty() {
            return Ok(PackageDocument::default());
        }
        serde_yaml::from_str(text).map_err(|source| ManifestError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Index-only document listing subpackages.
    pub fn index(subpackages: Vec<SubpackageRef>) -> Self {
        PackageDocument {
            subpackages,
            assets: ManifestDocument::new(),
        }
    }

    pub fn to_yaml(&self) -> Result<String, ManifestError> {
        serde_yaml::to_string(self).map_err(ManifestError::Serialize)
    }
}

/// A manifest with an optional subpackage name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    pub name: Option<String>,
    pub manifest: Manifest,
}

impl Package {
    pub fn new(name: Option<String>, manifest: Manifest) -> Self {
        Package { name, manifest }
    }
}

/// One or more packages written together.
///
/// A bundle with a single package is written flat; otherwise every package
/// becomes a named subpackage and a top-level index is written.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    packages: BTreeMap<String, Manifest>,
}

impl Bundle {
    pub fn new() -> Self {
        Bundle::default()
    }

    /// Get or create the manifest of a named package.
    pub fn package_mut(&mut self, name: &str) -> &mut Manifest {
        self.packages.entry(name.to_string()).or_default()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Manifest)> {
        self.packages.iter().map(|(name, manifest)| (name.as_str(), manifest))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Manifest)> {
        self.packages
            .iter_mut()
            .map(|(name, manifest)| (name.as_str(), manifest))
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Drop packages that have no assets left.
    pub fn prune_empty(&mut self) {
        self.packages.retain(|_, manifest| !manifest.is_empty());
    }

    /// Total number of assets across all packages.
    pub fn asset_count(&self) -> usize {
        self.packages.values().map(Manifest::len).sum()
    }

    /// Split into the packages to write.
    ///
    /// A single package is left unnamed so it lands at the bundle root.
    pub fn into_packages(self) -> Vec<Package> {
        if self.packages.len() == 1 {
            return self
                .packages
                .into_values()
                .map(|manifest| Package::new(None, manifest))
                .collect();
        }
        self.packages
            .into_iter()
            .map(|(name, manifest)| Package::new(Some(name), manifest))
            .collect()
    }
}
