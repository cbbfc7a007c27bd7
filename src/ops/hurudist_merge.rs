//! Implementation of `hurudist merge`.
//!
//! Loads one or more finished packages (following subpackage indexes),
//! reduces every asset to a single declaration by dataset tier and writes
//! the result as one package.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};

use crate::core::{
    AssetKey, AssetRecord, Dataset, Distribute, Manifest, ManifestError, PackageDocument,
    SubpackageRef, MANIFEST_FILE_NAME,
};
use crate::ops::reduce::{reduce_records, SanityError};
use crate::util::fs::{native_path, win_path_str};
use crate::util::interrupt::Interrupt;
use crate::util::output::{open_sink, OutputSink};

/// Options for the merge command.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Package directories to merge
    pub sources: Vec<PathBuf>,

    /// Directory or archive to write
    pub destination: PathBuf,

    /// Keep subpackage partitions instead of flattening
    pub preserve_subpackages: bool,

    /// Dataset assigned to assets that do not declare one
    pub dataset: Dataset,

    /// Distribution flag assigned to assets that do not declare one
    pub distribute: Distribute,
}

/// Result of a merge.
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub assets: usize,
    /// Required assets whose files were missing from their package
    pub missing: usize,
    pub conflicts: Vec<SanityError>,
}

/// One declaration of an asset, as loaded from a package.
#[derive(Debug, Clone)]
pub struct Declaration {
    /// Root directory of the package the declaration came from
    pub root: PathBuf,
    pub subpackage: Option<String>,
    /// Record with `source` relative to `root`
    pub record: AssetRecord,
}

/// The winning declaration of an asset.
#[derive(Debug, Clone)]
pub struct ReducedAsset {
    pub root: PathBuf,
    pub subpackages: BTreeSet<String>,
    pub record: AssetRecord,
}

/// Every declaration of every asset across the loaded packages.
#[derive(Debug, Default)]
pub struct AssetDatabase {
    entries: BTreeMap<AssetKey, Vec<Declaration>>,
}

impl AssetDatabase {
    pub fn new() -> Self {
        AssetDatabase::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn declarations(&self, key: &AssetKey) -> &[Declaration] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Load the package rooted at `root`, including its subpackages.
    pub fn load_package(&mut self, root: &Path) -> Result<(), ManifestError> {
        tracing::info!("Loading asset database '{}'...", root.display());
        let mut seen = HashSet::new();
        self.load_manifest(root, MANIFEST_FILE_NAME, None, &mut seen)
    }

    fn load_manifest(
        &mut self,
        root: &Path,
        manifest: &str,
        subpackage: Option<&str>,
        seen: &mut HashSet<PathBuf>,
    ) -> Result<(), ManifestError> {
        let manifest_rel = native_path(manifest);
        let manifest_path = root.join(&manifest_rel);
        if !seen.insert(manifest_path.clone()) {
            return Err(ManifestError::MalformedPackage {
                package: manifest.to_string(),
                reason: "is referenced more than once".to_string(),
            });
        }

        tracing::debug!("Loading package '{}'...", manifest);
        let document = PackageDocument::load(&manifest_path)?;
        if !document.subpackages.is_empty() && !document.assets.is_empty() {
            tracing::warn!(
                "Package '{}' has subpackages and assets. This is nonstandard and may not work.",
                manifest
            );
        }

        for SubpackageRef { name, source } in &document.subpackages {
            let Some(name) = name.as_deref().filter(|n| !n.is_empty()) else {
                return Err(ManifestError::MalformedPackage {
                    package: manifest.to_string(),
                    reason: "has an unnamed subpackage".to_string(),
                });
            };
            let Some(source) = source.as_deref().filter(|s| !s.is_empty()) else {
                return Err(ManifestError::MalformedPackage {
                    package: manifest.to_string(),
                    reason: format!("has a subpackage named '{}' without a source path", name),
                });
            };
            self.load_manifest(root, source, Some(name), seen)?;
        }

        // Sources are relative to the manifest; make them relative to the root.
        let manifest_dir = manifest_rel
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        for (category, assets) in document.assets {
            for (filename, mut record) in assets {
                let key = AssetKey::new(category, filename);
                let Some(source) = record.source.as_deref() else {
                    return Err(ManifestError::MalformedPackage {
                        package: manifest.to_string(),
                        reason: format!("has an asset {} without a source", key),
                    });
                };
                record.source = Some(win_path_str([manifest_dir.as_str(), source]));
                if let Some(compressed) = record.compressed_source.as_deref() {
                    record.compressed_source =
                        Some(win_path_str([manifest_dir.as_str(), compressed]));
                }

                self.entries.entry(key).or_default().push(Declaration {
                    root: root.to_path_buf(),
                    subpackage: subpackage.map(str::to_string),
                    record,
                });
            }
        }
        Ok(())
    }

    /// Reduce every asset to one declaration.
    ///
    /// Assets whose declarations conflict are dropped and reported.
    pub fn reduce(self) -> (BTreeMap<AssetKey, ReducedAsset>, Vec<SanityError>) {
        tracing::info!("Reducing database...");
        let mut reduced = BTreeMap::new();
        let mut conflicts = Vec::new();

        for (key, declarations) in self.entries {
            let records: Vec<&AssetRecord> = declarations.iter().map(|d| &d.record).collect();
            match reduce_records(&key, &records) {
                Ok((winner, record)) => {
                    let subpackages = declarations
                        .iter()
                        .filter_map(|d| d.subpackage.clone())
                        .collect();
                    let root = declarations[winner].root.clone();
                    reduced.insert(
                        key,
                        ReducedAsset {
                            root,
                            subpackages,
                            record,
                        },
                    );
                }
                Err(e) => {
                    tracing::error!("{}. Discarding.", e);
                    conflicts.push(e);
                }
            }
        }
        (reduced, conflicts)
    }
}

/// Package-relative destination of a compressed copy.
fn compressed_file_name(filename: &str, compressed_source: &str) -> String {
    let compressed = native_path(compressed_source);
    match compressed.extension() {
        Some(ext) => format!("{}.{}", filename, ext.to_string_lossy()),
        None => format!("{}.gz", filename),
    }
}

/// Copy reduced assets into `sink` and write their manifests.
///
/// Assets whose files are gone from their package are left out and counted.
/// Nothing is written after an interrupt, so an interrupted merge never
/// leaves a manifest behind. Returns the written and missing asset counts.
pub fn save_database(
    assets: BTreeMap<AssetKey, ReducedAsset>,
    sink: &mut dyn OutputSink,
    opts: &MergeOptions,
    interrupt: &Interrupt,
) -> Result<(usize, usize)> {
    let mut root_manifest = Manifest::new();
    let mut subpackages: BTreeMap<String, Manifest> = BTreeMap::new();
    let mut written = 0;
    let mut missing = 0;

    tracing::info!("Copying assets...");
    for (key, asset) in assets {
        let ReducedAsset {
            root,
            subpackages: members,
            mut record,
        } = asset;
        let subdir = key.category().package_subdirectory();

        let Some(source) = record.source.take() else {
            bail!("asset {} has no source", key);
        };
        let source_path = root.join(native_path(&source));
        let compressed = record
            .compressed_source
            .take()
            .map(|c| (root.join(native_path(&c)), compressed_file_name(key.filename(), &c)));
        let absent = std::iter::once(&source_path)
            .chain(compressed.as_ref().map(|(path, _)| path))
            .find(|path| !path.is_file());
        if let Some(absent) = absent {
            if record.optional {
                tracing::debug!(
                    "Optional asset {} is missing '{}'. Skipping.",
                    key,
                    absent.display()
                );
            } else {
                tracing::warn!("Asset {} is missing '{}'. Skipping.", key, absent.display());
                missing += 1;
            }
            continue;
        }

        interrupt.check()?;
        let dest = Path::new(subdir).join(native_path(key.filename()));
        tracing::debug!("Copying '{}' to '{}'", source_path.display(), dest.display());
        sink.copy_file(&source_path, &dest)?;
        record.source = Some(win_path_str([subdir, key.filename()]));

        if let Some((compressed_path, compressed_name)) = compressed {
            interrupt.check()?;
            let dest = Path::new(subdir).join(native_path(&compressed_name));
            sink.copy_file(&compressed_path, &dest)?;
            record.compressed_source = Some(win_path_str([subdir, compressed_name.as_str()]));
        }
        record.apply_defaults(opts.dataset, opts.distribute);
        written += 1;

        if opts.preserve_subpackages && !members.is_empty() {
            for member in members {
                subpackages
                    .entry(member)
                    .or_default()
                    .insert(key.clone(), record.clone());
            }
        } else {
            root_manifest.insert(key, record);
        }
    }

    interrupt.check()?;
    let mut index = Vec::new();
    if !subpackages.is_empty() {
        tracing::info!("Writing subpackage YAML...");
        for (name, manifest) in &subpackages {
            let source = format!("{}.yml", name);
            sink.write_text(Path::new(&source), &manifest.to_yaml()?)?;
            index.push(SubpackageRef::new(name.clone(), source));
        }
    }

    tracing::info!("Writing package YAML...");
    let document = PackageDocument {
        subpackages: index,
        assets: root_manifest.to_document(),
    };
    sink.write_text(Path::new(MANIFEST_FILE_NAME), &document.to_yaml()?)?;
    Ok((written, missing))
}

/// Run the merge command.
pub fn merge(opts: &MergeOptions, interrupt: &Interrupt) -> Result<MergeReport> {
    let start = Instant::now();
    if opts.sources.is_empty() {
        bail!("no source packages given");
    }

    let mut database = AssetDatabase::new();
    for source in &opts.sources {
        if !source.exists() {
            bail!("source path '{}' does not exist", source.display());
        }
        if !source.is_dir() {
            bail!("source path '{}' must be a directory", source.display());
        }
        database
            .load_package(source)
            .with_context(|| format!("failed to load package '{}'", source.display()))?;
        interrupt.check()?;
    }
    tracing::info!("Loaded {} asset(s)", database.len());

    let (assets, conflicts) = database.reduce();
    interrupt.check()?;

    let (assets, missing) = write_database(assets, opts, interrupt)
        .with_context(|| format!("failed to write '{}'", opts.destination.display()))?;

    tracing::debug!("Merge finished in {:.2}s", start.elapsed().as_secs_f64());
    Ok(MergeReport {
        assets,
        missing,
        conflicts,
    })
}

fn write_database(
    assets: BTreeMap<AssetKey, ReducedAsset>,
    opts: &MergeOptions,
    interrupt: &Interrupt,
) -> Result<(usize, usize)> {
    let mut sink = open_sink(&opts.destination)?;
    let counts = save_database(assets, sink.as_mut(), opts, interrupt)?;
    sink.finish()?;
    Ok(counts)
}
