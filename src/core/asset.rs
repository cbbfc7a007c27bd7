//! Asset keys and per-asset records.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::core::category::AssetCategory;
use crate::core::dataset::{Dataset, Distribute};

/// Identity of an asset within a manifest.
///
/// Filenames compare case-insensitively, but the spelling first seen is
/// kept for output.
#[derive(Debug, Clone)]
pub struct AssetKey {
    category: AssetCategory,
    filename: String,
    folded: String,
}

impl AssetKey {
    /// Create a key. Backslash separators are normalized to `/`.
    pub fn new(category: AssetCategory, filename: impl Into<String>) -> Self {
        let filename = filename.into().replace('\\', "/");
        let folded = filename.to_lowercase();
        AssetKey {
            category,
            filename,
            folded,
        }
    }

    pub fn category(&self) -> AssetCategory {
        self.category
    }

    /// The filename as originally spelled.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Last path component of the filename.
    pub fn file_name(&self) -> &str {
        self.filename
            .rsplit('/')
            .next()
            .unwrap_or(self.filename.as_str())
    }
}

impl PartialEq for AssetKey {
    fn eq(&self, other: &Self) -> bool {
        self.category == other.category && self.folded == other.folded
    }
}

impl Eq for AssetKey {}

impl Hash for AssetKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.category.hash(state);
        self.folded.hash(state);
    }
}

impl PartialOrd for AssetKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AssetKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.category
            .cmp(&other.category)
            .then_with(|| self.folded.cmp(&other.folded))
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "('{}', '{}')", self.category, self.filename)
    }
}

/// Attributes of a single asset.
///
/// Records start life as bare stubs carrying only `options` and maybe
/// `optional`; the remaining fields are filled in as the pipeline runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetRecord {
    /// Package-relative path of the file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Package-relative path of a compressed copy of the file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_source: Option<String>,

    /// Free-form tags. Only ever unioned, never replaced.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub options: BTreeSet<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<Dataset>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribute: Option<Distribute>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Seconds since the epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modify_time: Option<i64>,

    #[serde(alias = "hash_md5", skip_serializing_if = "Option::is_none")]
    pub hash_fast: Option<String>,

    #[serde(alias = "hash_sha2", skip_serializing_if = "Option::is_none")]
    pub hash_strong: Option<String>,

    /// Missing optional assets are not worth a warning.
    #[serde(skip_serializing_if = "is_false")]
    pub optional: bool,

    /// Target operating system of a client artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,

    /// Target architecture of a client artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl AssetRecord {
    /// Create an empty stub record.
    pub fn new() -> Self {
        AssetRecord::default()
    }

    /// Create a stub record carrying the given tags.
    pub fn with_options<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AssetRecord {
            options: options.into_iter().map(Into::into).collect(),
            ..AssetRecord::default()
        }
    }

    /// Union another record's tags into this one.
    pub fn merge_options(&mut self, other: &AssetRecord) {
        self.options.extend(other.options.iter().cloned());
    }

    /// Dataset tier, treating an unset tier as `base`.
    pub fn effective_dataset(&self) -> Dataset {
        self.dataset.unwrap_or_default()
    }

    /// Fill in `dataset` and `distribute` where they are still unset.
    pub fn apply_defaults(&mut self, dataset: Dataset, distribute: Distribute) {
        self.dataset.get_or_insert(dataset);
        self.distribute.get_or_insert(distribute);
    }
}
