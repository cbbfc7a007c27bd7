//! Merging per-page dependency fragments into one manifest.
//!
//! Fragments only carry tags at this point, so a key seen twice keeps the
//! record it was first inserted with and gains the tags of every later
//! fragment.

use crate::core::Manifest;

/// Fold `fragment` into `manifest`.
pub fn merge_fragment(manifest: &mut Manifest, fragment: Manifest) {
    for (key, record) in fragment {
        manifest.insert_or_merge(key, record);
    }
}

/// Merge a sequence of fragments into a fresh manifest.
pub fn merge_fragments<I>(fragments: I) -> Manifest
where
    I: IntoIterator<Item = Manifest>,
{
    let mut manifest = Manifest::new();
    for fragment in fragments {
        merge_fragment(&mut manifest, fragment);
    }
    manifest
}
