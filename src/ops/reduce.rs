//! Collapsing duplicate asset declarations by dataset tier.
//!
//! When the same asset is declared by several sources, the declaration from
//! the highest dataset tier wins outright. Declarations at the same tier
//! must describe the same file: every one of `size`, `hash_fast` and
//! `hash_strong` that both declarations carry has to match, and at least
//! one of them has to be present in both.
//!
//! A single matching field is not enough. Two declarations with the same
//! `size` but a different hash are a conflict, even though the sizes agree.
//! An asset whose top-tier declarations cannot be reconciled is dropped
//! rather than guessed at. Tags are unioned across every declaration,
//! winners and losers alike.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::{AssetKey, AssetRecord, Dataset, Manifest};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanityError {
    #[error("asset {key} has conflicting '{dataset}' declarations ({field} differs)")]
    Conflict {
        key: String,
        dataset: Dataset,
        field: &'static str,
    },

    #[error("asset {key} has '{dataset}' declarations that cannot be proven equivalent")]
    Unverifiable { key: String, dataset: Dataset },
}

impl SanityError {
    pub fn key(&self) -> &str {
        match self {
            SanityError::Conflict { key, .. } | SanityError::Unverifiable { key, .. } => key,
        }
    }
}

/// Check that two same-tier declarations describe the same file.
fn check_equivalent(key: &AssetKey, a: &AssetRecord, b: &AssetRecord) -> Result<(), SanityError> {
    let dataset = a.effective_dataset();
    let fields: [(&'static str, Option<String>, Option<String>); 3] = [
        ("size", a.size.map(|s| s.to_string()), b.size.map(|s| s.to_string())),
        ("hash_strong", a.hash_strong.clone(), b.hash_strong.clone()),
        ("hash_fast", a.hash_fast.clone(), b.hash_fast.clone()),
    ];

    let mut compared = false;
    for (field, left, right) in fields {
        if let (Some(left), Some(right)) = (left, right) {
            if !left.eq_ignore_ascii_case(&right) {
                return Err(SanityError::Conflict {
                    key: key.to_string(),
                    dataset,
                    field,
                });
            }
            compared = true;
        }
    }

    if compared {
        Ok(())
    } else {
        Err(SanityError::Unverifiable {
            key: key.to_string(),
            dataset,
        })
    }
}

/// Reduce every declaration of one asset to a single record.
///
/// Returns the index of the winning declaration along with the reduced
/// record. The result does not depend on the order of `records`.
pub fn reduce_records(
    key: &AssetKey,
    records: &[&AssetRecord],
) -> Result<(usize, AssetRecord), SanityError> {
    let Some(top) = records.iter().map(|r| r.effective_dataset()).max() else {
        return Err(SanityError::Unverifiable {
            key: key.to_string(),
            dataset: Dataset::default(),
        });
    };

    let contenders: Vec<usize> = (0..records.len())
        .filter(|&i| records[i].effective_dataset() == top)
        .collect();
    for (pos, &i) in contenders.iter().enumerate() {
        for &j in &contenders[pos + 1..] {
            check_equivalent(key, records[i], records[j])?;
        }
    }

    let winner = contenders[0];
    let mut reduced = records[winner].clone();
    for record in records {
        reduced.merge_options(record);
    }
    Ok((winner, reduced))
}

/// Outcome of reducing several manifests.
#[derive(Debug, Clone, Default)]
pub struct Reduction {
    pub manifest: Manifest,
    /// One entry per dropped asset
    pub conflicts: Vec<SanityError>,
}

/// Reduce several manifests into one authoritative manifest.
pub fn reduce_manifests(sources: &[Manifest]) -> Reduction {
    let mut declarations: BTreeMap<&AssetKey, Vec<&AssetRecord>> = BTreeMap::new();
    for source in sources {
        for (key, record) in source.iter() {
            declarations.entry(key).or_default().push(record);
        }
    }

    let mut reduction = Reduction::default();
    for (key, records) in declarations {
        match reduce_records(key, &records) {
            Ok((_, record)) => {
                reduction.manifest.insert(key.clone(), record);
            }
            Err(e) => {
                tracing::error!("{}. Discarding.", e);
                reduction.conflicts.push(e);
            }
        }
    }
    reduction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AssetCategory;

    fn record(dataset: Dataset, hash: Option<&str>, options: &[&str]) -> AssetRecord {
        AssetRecord {
            dataset: Some(dataset),
            hash_strong: hash.map(str::to_string),
            ..AssetRecord::with_options(options.iter().copied())
        }
    }

    fn single(key: &AssetKey, record: AssetRecord) -> Manifest {
        std::iter::once((key.clone(), record)).collect()
    }

    fn x_dat() -> AssetKey {
        AssetKey::new(AssetCategory::Data, "x.dat")
    }

    #[test]
    fn test_equal_tier_matching_hash_unions_options() {
        let key = x_dat();
        let a = single(&key, record(Dataset::Base, Some("aaa"), &["r"]));
        let b = single(&key, record(Dataset::Base, Some("aaa"), &["s"]));

        let reduction = reduce_manifests(&[a, b]);
        assert!(reduction.conflicts.is_empty());
        let reduced = reduction.manifest.get(&key).unwrap();
        assert_eq!(
            reduced.options.iter().map(String::as_str).collect::<Vec<_>>(),
            ["r", "s"]
        );
    }

    #[test]
    fn test_equal_tier_differing_hash_drops_key() {
        let key = x_dat();
        let a = single(&key, record(Dataset::Base, Some("aaa"), &["r"]));
        let b = single(&key, record(Dataset::Base, Some("bbb"), &["s"]));

        let reduction = reduce_manifests(&[a, b]);
        assert!(reduction.manifest.is_empty());
        assert_eq!(reduction.conflicts.len(), 1);
        assert!(matches!(
            reduction.conflicts[0],
            SanityError::Conflict { field: "hash_strong", .. }
        ));
    }

    #[test]
    fn test_equal_tier_same_size_differing_hash_drops_key() {
        let key = x_dat();
        let a = single(&key, AssetRecord { size: Some(3), ..record(Dataset::Base, Some("aaa"), &[]) });
        let b = single(&key, AssetRecord { size: Some(3), ..record(Dataset::Base, Some("bbb"), &[]) });

        let reduction = reduce_manifests(&[a, b]);
        assert!(reduction.manifest.is_empty());
        assert!(matches!(
            reduction.conflicts[0],
            SanityError::Conflict { field: "hash_strong", .. }
        ));
    }

    #[test]
    fn test_equal_tier_without_comparable_fields_drops_key() {
        let key = x_dat();
        let a = single(&key, AssetRecord { size: Some(3), ..record(Dataset::Base, None, &[]) });
        let b = single(&key, record(Dataset::Base, Some("aaa"), &[]));

        let reduction = reduce_manifests(&[a, b]);
        assert!(reduction.manifest.is_empty());
        assert!(matches!(reduction.conflicts[0], SanityError::Unverifiable { .. }));
    }

    #[test]
    fn test_higher_tier_wins() {
        let key = x_dat();
        let contrib = AssetRecord {
            size: Some(10),
            source: Some("contrib\\x.dat".to_string()),
            ..record(Dataset::Contrib, Some("ccc"), &["c"])
        };
        let cyan = AssetRecord {
            size: Some(99),
            source: Some("cyan\\x.dat".to_string()),
            ..record(Dataset::Cyan, Some("yyy"), &["y"])
        };

        for sources in [
            [single(&key, contrib.clone()), single(&key, cyan.clone())],
            [single(&key, cyan.clone()), single(&key, contrib.clone())],
        ] {
            let reduction = reduce_manifests(&sources);
            let reduced = reduction.manifest.get(&key).unwrap();
            assert_eq!(reduced.size, Some(10));
            assert_eq!(reduced.hash_strong.as_deref(), Some("ccc"));
            assert_eq!(reduced.source.as_deref(), Some("contrib\\x.dat"));
            assert_eq!(reduced.options.len(), 2);
        }
    }

    #[test]
    fn test_lower_tier_conflicts_do_not_matter() {
        let key = x_dat();
        let sources = [
            single(&key, record(Dataset::Cyan, Some("a"), &[])),
            single(&key, record(Dataset::Cyan, Some("b"), &[])),
            single(&key, record(Dataset::Override, Some("o"), &[])),
        ];
        let reduction = reduce_manifests(&sources);
        assert!(reduction.conflicts.is_empty());
        assert_eq!(reduction.manifest.get(&key).unwrap().hash_strong.as_deref(), Some("o"));
    }

    #[test]
    fn test_reduction_is_idempotent() {
        let key = x_dat();
        let other = AssetKey::new(AssetCategory::Sfx, "bird.ogg");
        let mut manifest = single(&key, record(Dataset::Base, Some("aaa"), &["r"]));
        manifest.insert(other.clone(), AssetRecord { size: Some(4), ..record(Dataset::Contrib, None, &[]) });

        let reduction = reduce_manifests(&[manifest.clone(), manifest.clone()]);
        assert!(reduction.conflicts.is_empty());
        assert_eq!(reduction.manifest, manifest);
    }

    #[test]
    fn test_missing_dataset_counts_as_base() {
        let key = x_dat();
        let unset = AssetRecord { hash_strong: Some("aaa".to_string()), ..AssetRecord::new() };
        let base = record(Dataset::Base, Some("aaa"), &["b"]);
        let (_, reduced) = reduce_records(&key, &[&unset, &base]).unwrap();
        assert!(reduced.options.contains("b"));
    }
}
