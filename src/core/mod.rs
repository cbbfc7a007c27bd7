//! Core data structures for HuruDist.
//!
//! This module contains the foundational types used throughout the packager:
//! - Asset categories and their directory tables
//! - Dataset tiers and distribution flags
//! - Asset keys and records
//! - Manifests, packages and bundles

pub mod asset;
pub mod category;
pub mod dataset;
pub mod manifest;

pub use asset::{AssetKey, AssetRecord};
pub use category::AssetCategory;
pub use dataset::{Dataset, Distribute};
pub use manifest::{
    Bundle, Manifest, ManifestDocument, ManifestError, Package, PackageDocument, SubpackageRef,
    MANIFEST_FILE_NAME,
};
