//! Implementation of `hurudist package`.
//!
//! The pipeline is staged. Each stage hands its tasks to the worker pool
//! and waits for all of them before the next stage starts:
//!
//! 1. discover worlds and their pages
//! 2. scan every page for the assets it references
//! 3. resolve state descriptor and script module closures
//! 4. resolve, stat and hash every asset, dropping missing or unreadable ones
//! 5. copy everything into the output sink and write the manifests

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};

use crate::core::{
    AssetCategory, AssetKey, Bundle, Dataset, Distribute, Manifest, Package, PackageDocument,
    SubpackageRef, MANIFEST_FILE_NAME,
};
use crate::ops::merge::merge_fragment;
use crate::ops::workers::WorkerPool;
use crate::resolver::{
    load_descriptor_sources, module_name, resolve_descriptors, ExternalIntrospector,
    ModuleIntrospector, ScriptResolver, SdlFile,
};
use crate::sources::client::{client_artifacts, engine_scripts, intro_videos, CLIENT_PACKAGE};
use crate::sources::{scan_page, AgeInfo, ContentLayout, ExternalPageReader, PageReader};
use crate::util::fs::{file_stat, glob_files, native_path, win_path_str};
use crate::util::hash::{hash_file, HashKind};
use crate::util::interrupt::Interrupt;
use crate::util::output::{open_sink, OutputSink};
use crate::util::process::{find_executable, find_python_interpreter};

/// Which worlds to package.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AgeSelection {
    /// Every `.age` file in the data directory
    #[default]
    All,
    /// A single world by name
    Single(String),
    /// No worlds at all
    None,
}

/// Options for the package command.
#[derive(Debug, Clone)]
pub struct PackageOptions {
    /// Client content root
    pub source: PathBuf,

    /// Directory or archive to write
    pub destination: PathBuf,

    /// Separate checkout of scripts and state descriptors
    pub scripts: Option<PathBuf>,

    pub ages: AgeSelection,

    /// Package client binaries, engine scripts and intro videos
    pub include_client: bool,

    /// Resolve state descriptors and script imports of world scripts
    pub script_dependencies: bool,

    /// Interpreter used for import introspection (None = search PATH)
    pub python: Option<PathBuf>,

    /// Import introspection tool
    pub py_tools: Option<PathBuf>,

    /// Program listing the references of a page
    pub page_reader: Option<PathBuf>,
    pub page_reader_args: Vec<String>,

    pub dataset: Dataset,
    pub distribute: Distribute,
    pub client_arch: String,

    /// Descriptors required by the engine itself
    pub client_descriptors: Vec<String>,

    /// Worker count (None = available parallelism)
    pub jobs: Option<usize>,

    /// Show progress bars
    pub progress: bool,
}

impl Default for PackageOptions {
    fn default() -> Self {
        PackageOptions {
            source: PathBuf::new(),
            destination: PathBuf::new(),
            scripts: None,
            ages: AgeSelection::All,
            include_client: true,
            script_dependencies: true,
            python: None,
            py_tools: None,
            page_reader: None,
            page_reader_args: Vec::new(),
            dataset: Dataset::default(),
            distribute: Distribute::default(),
            client_arch: crate::sources::client::default_client_arch().to_string(),
            client_descriptors: Vec::new(),
            jobs: None,
            progress: false,
        }
    }
}

/// Summary of a packaging run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageReport {
    pub packages: usize,
    pub assets: usize,
    /// Required assets that were missing from the client or unreadable
    pub missing: usize,
    /// Scan, closure and hash tasks that failed
    pub failed_tasks: usize,
}

impl PackageReport {
    /// Whether the package is complete.
    pub fn is_success(&self) -> bool {
        self.missing == 0
    }
}

/// One page to scan.
#[derive(Debug, Clone)]
struct ScanUnit {
    index: usize,
    world: String,
    page: PathBuf,
}

/// A closure to resolve for one package.
enum ClosureJob<'n> {
    Descriptors { package: &'n str, roots: Vec<String> },
    Scripts { package: &'n str, modules: Vec<String> },
}

struct ClosureResult {
    package: String,
    category: AssetCategory,
    files: BTreeSet<String>,
}

/// An asset that exists on disk and is waiting for its digests.
struct HashJob {
    package: String,
    key: AssetKey,
    path: PathBuf,
    kind: HashKind,
}

/// Drives one packaging run.
pub struct PackageAssembler<'a> {
    layout: ContentLayout,
    pool: WorkerPool,
    page_reader: Option<&'a dyn PageReader>,
    introspector: Option<&'a dyn ModuleIntrospector>,
    opts: &'a PackageOptions,
    failed_tasks: usize,
}

impl<'a> PackageAssembler<'a> {
    pub fn new(
        layout: ContentLayout,
        pool: WorkerPool,
        page_reader: Option<&'a dyn PageReader>,
        introspector: Option<&'a dyn ModuleIntrospector>,
        opts: &'a PackageOptions,
    ) -> Self {
        PackageAssembler {
            layout,
            pool,
            page_reader,
            introspector,
            opts,
            failed_tasks: 0,
        }
    }

    /// Run every stage and write the bundle to `destination`.
    pub fn run(mut self, destination: &Path) -> Result<PackageReport> {
        let mut bundle = Bundle::new();

        let worlds = self.load_worlds()?;
        let units = self.discover_pages(&worlds, &mut bundle);
        tracing::info!("Found {} Plasma pages.", units.len());

        self.scan_pages(units, &mut bundle)?;

        if self.opts.include_client {
            tracing::info!("Searching for client files...");
            self.discover_client(&mut bundle)?;
        }

        self.resolve_closures(&mut bundle)?;

        tracing::info!("Beginning final pass over assets...");
        let (sources, missing) = self.prepare(&mut bundle)?;

        self.pool.interrupt().check()?;

        tracing::info!("Producing final asset bundle...");
        let report = PackageReport {
            packages: bundle.len(),
            assets: bundle.asset_count(),
            missing,
            failed_tasks: self.failed_tasks,
        };
        let mut sink = open_sink(destination)?;
        write_bundle(bundle, &sources, sink.as_mut(), self.pool.interrupt())?;
        sink.finish()?;
        Ok(report)
    }

    fn load_worlds(&self) -> Result<Vec<AgeInfo>> {
        let data_dir = self.layout.category_dir(AssetCategory::Data);
        match &self.opts.ages {
            AgeSelection::None => Ok(Vec::new()),
            AgeSelection::Single(name) => {
                let info = AgeInfo::load(&data_dir.join(format!("{}.age", name)))?;
                Ok(vec![info])
            }
            AgeSelection::All => {
                tracing::info!("Loading age files...");
                let mut worlds = Vec::new();
                for path in glob_files(&data_dir, "*.age")? {
                    worlds.push(AgeInfo::load(&path)?);
                }
                if worlds.is_empty() {
                    tracing::warn!("No age files found in client!");
                }
                Ok(worlds)
            }
        }
    }

    /// Add world data stubs and list the pages that exist.
    fn discover_pages(&self, worlds: &[AgeInfo], bundle: &mut Bundle) -> Vec<ScanUnit> {
        let data_dir = self.layout.category_dir(AssetCategory::Data);
        let mut units = Vec::new();

        for world in worlds {
            let manifest = bundle.package_mut(&world.name);
            manifest.insert_stub(AssetCategory::Data, world.age_file_name());
            if world.has_fog_file() {
                manifest.insert_stub(AssetCategory::Data, world.fog_file_name());
            }

            for page_name in world.page_file_names() {
                let page = data_dir.join(&page_name);
                if page.is_file() {
                    manifest.insert_stub(AssetCategory::Data, page_name);
                    units.push(ScanUnit {
                        index: units.len(),
                        world: world.name.clone(),
                        page,
                    });
                } else {
                    tracing::warn!("Age Page '{}' is missing from the client...", page_name);
                }
            }
        }
        units
    }

    fn scan_pages(&mut self, units: Vec<ScanUnit>, bundle: &mut Bundle) -> Result<()> {
        if units.is_empty() {
            return Ok(());
        }
        let Some(reader) = self.page_reader else {
            tracing::warn!("No page reader configured; page references will not be packaged.");
            return Ok(());
        };

        let mut fragments: Vec<Option<(String, Manifest)>> = vec![None; units.len()];
        let summary = self.pool.run_stage(
            "Scanning pages",
            units,
            |unit: ScanUnit| {
                let fragment = scan_page(reader, &unit.page)
                    .with_context(|| format!("failed to scan '{}'", unit.page.display()))?;
                Ok((unit.index, unit.world, fragment))
            },
            |(index, world, fragment)| fragments[index] = Some((world, fragment)),
        )?;
        self.failed_tasks += summary.failed;

        // Merge in page order so the kept records do not depend on timing.
        tracing::info!("Merging results from {} dependency lists...", summary.completed);
        for (world, fragment) in fragments.into_iter().flatten() {
            merge_fragment(bundle.package_mut(&world), fragment);
        }
        Ok(())
    }

    fn discover_client(&self, bundle: &mut Bundle) -> Result<()> {
        let artifacts = client_artifacts(&self.layout, &self.opts.client_arch)?;
        let manifest = bundle.package_mut(CLIENT_PACKAGE);
        merge_fragment(manifest, artifacts);

        for script in engine_scripts(&self.layout)? {
            manifest.insert_stub(AssetCategory::Python, script);
        }
        for video in intro_videos(&self.layout)? {
            manifest.insert_stub(AssetCategory::Avi, video);
        }
        Ok(())
    }

    /// Resolve descriptor and import closures of every package.
    ///
    /// Each job resolves one category of one package, and only this thread
    /// inserts the resulting stubs.
    fn resolve_closures(&mut self, bundle: &mut Bundle) -> Result<()> {
        let mut world_modules: BTreeMap<String, Vec<String>> = BTreeMap::new();
        if self.opts.script_dependencies {
            for (name, manifest) in bundle.iter() {
                if name == CLIENT_PACKAGE && self.opts.include_client {
                    continue;
                }
                let modules: Vec<String> = manifest
                    .category(AssetCategory::Python)
                    .map(|(key, _)| module_name(key.filename()).to_string())
                    .collect();
                if !modules.is_empty() {
                    world_modules.insert(name.to_string(), modules);
                }
            }
        }

        let mut jobs = Vec::new();
        for (package, modules) in &world_modules {
            jobs.push(ClosureJob::Descriptors {
                package: package.as_str(),
                roots: modules.clone(),
            });
        }
        if self.opts.include_client {
            jobs.push(ClosureJob::Descriptors {
                package: CLIENT_PACKAGE,
                roots: self.opts.client_descriptors.clone(),
            });
        }
        if !world_modules.is_empty() {
            match self.introspector {
                Some(_) => {
                    for (package, modules) in &world_modules {
                        jobs.push(ClosureJob::Scripts {
                            package: package.as_str(),
                            modules: modules.clone(),
                        });
                    }
                }
                None => tracing::warn!("Age Python may not be completely bundled!"),
            }
        }
        if jobs.is_empty() {
            return Ok(());
        }

        tracing::info!("Searching for PythonFileMod dependencies...");
        let sdl_dir = self.layout.category_dir(AssetCategory::Sdl);
        let descriptor_sources: Vec<SdlFile> = load_descriptor_sources(&sdl_dir)?;
        let python_dir = self.layout.category_dir(AssetCategory::Python);
        let introspector = self.introspector;

        let mut results = Vec::new();
        let summary = self.pool.run_stage(
            "Resolving dependencies",
            jobs,
            |job| match job {
                ClosureJob::Descriptors { package, roots } => {
                    let closure =
                        resolve_descriptors(&descriptor_sources, roots.iter().map(String::as_str));
                    Ok(ClosureResult {
                        package: package.to_string(),
                        category: AssetCategory::Sdl,
                        files: closure.files,
                    })
                }
                ClosureJob::Scripts { package, modules } => {
                    let Some(introspector) = introspector else {
                        bail!("no interpreter available for '{}'", package);
                    };
                    let resolver = ScriptResolver::new(introspector, &python_dir);
                    Ok(ClosureResult {
                        package: package.to_string(),
                        category: AssetCategory::Python,
                        files: resolver.resolve(modules.iter().map(String::as_str)),
                    })
                }
            },
            |result| results.push(result),
        )?;
        self.failed_tasks += summary.failed;

        for ClosureResult {
            package,
            category,
            files,
        } in results
        {
            let manifest = bundle.package_mut(&package);
            for file in files {
                manifest.insert_stub(category, file);
            }
        }
        Ok(())
    }

    /// Resolve, stat and hash every asset. Missing assets are removed.
    ///
    /// Returns the resolved source path of every remaining asset and the
    /// number of required assets that were missing.
    fn prepare(
        &mut self,
        bundle: &mut Bundle,
    ) -> Result<(BTreeMap<String, BTreeMap<AssetKey, PathBuf>>, usize)> {
        let mut sources: BTreeMap<String, BTreeMap<AssetKey, PathBuf>> = BTreeMap::new();
        let mut hash_jobs = Vec::new();
        let mut missing = 0;

        for (package, manifest) in bundle.iter_mut() {
            let resolved = sources.entry(package.to_string()).or_default();
            let mut absent = Vec::new();

            for (key, record) in manifest.iter_mut() {
                let Some(path) = self.layout.asset_path(key.category(), key.filename()) else {
                    let expected = self.layout.expected_path(key.category(), key.filename());
                    if record.optional {
                        tracing::debug!(
                            "Optional asset '{}' (used in '{}') is not present.",
                            key.file_name(),
                            package
                        );
                    } else {
                        tracing::warn!(
                            "Asset '{}' (used in '{}') is missing from the client.",
                            expected.display(),
                            package
                        );
                        missing += 1;
                    }
                    absent.push(key.clone());
                    continue;
                };

                let (size, modify_time) = file_stat(&path)?;
                record.size = Some(size);
                record.modify_time = Some(modify_time);
                record.apply_defaults(self.opts.dataset, self.opts.distribute);

                for kind in [HashKind::Fast, HashKind::Strong] {
                    hash_jobs.push(HashJob {
                        package: package.to_string(),
                        key: key.clone(),
                        path: path.clone(),
                        kind,
                    });
                }
                resolved.insert(key.clone(), path);
            }

            for key in absent {
                manifest.remove(&key);
            }
        }
        bundle.prune_empty();

        let summary = self.pool.run_stage(
            "Hashing assets",
            hash_jobs,
            |job: HashJob| {
                let digest = hash_file(&job.path, job.kind)?;
                Ok((job.package, job.key, job.kind, digest))
            },
            |(package, key, kind, digest)| {
                let record = bundle.package_mut(&package).get_mut(&key);
                if let Some(record) = record {
                    match kind {
                        HashKind::Fast => record.hash_fast = Some(digest),
                        HashKind::Strong => record.hash_strong = Some(digest),
                    }
                }
            },
        )?;
        self.failed_tasks += summary.failed;
        missing += drop_unhashed(bundle, &mut sources);

        Ok((sources, missing))
    }
}

/// Remove records the hash stage could not fill in.
///
/// Returns the number of required assets removed.
fn drop_unhashed(
    bundle: &mut Bundle,
    sources: &mut BTreeMap<String, BTreeMap<AssetKey, PathBuf>>,
) -> usize {
    let mut dropped = 0;
    for (package, manifest) in bundle.iter_mut() {
        let unhashed: Vec<(AssetKey, bool)> = manifest
            .iter()
            .filter(|(_, record)| record.hash_fast.is_none() || record.hash_strong.is_none())
            .map(|(key, record)| (key.clone(), record.optional))
            .collect();

        for (key, optional) in unhashed {
            if optional {
                tracing::debug!(
                    "Optional asset '{}' (used in '{}') could not be read.",
                    key.file_name(),
                    package
                );
            } else {
                tracing::warn!(
                    "Asset '{}' (used in '{}') could not be read.",
                    key.file_name(),
                    package
                );
                dropped += 1;
            }
            manifest.remove(&key);
            if let Some(resolved) = sources.get_mut(package) {
                resolved.remove(&key);
            }
        }
    }
    bundle.prune_empty();
    dropped
}

/// Copy one package's files under `prefix`.
///
/// Returns the package manifest with sources pointing into the package.
fn copy_package(
    sink: &mut dyn OutputSink,
    package: &Package,
    sources: &BTreeMap<AssetKey, PathBuf>,
    interrupt: &Interrupt,
) -> Result<Manifest> {
    let prefix = package.name.as_deref().unwrap_or("");
    let mut manifest = package.manifest.clone();

    for (key, record) in manifest.iter_mut() {
        let Some(source_path) = sources.get(key) else {
            bail!("asset {} was never resolved", key);
        };
        interrupt.check()?;
        let subdir = key.category().package_subdirectory();
        let dest = Path::new(prefix)
            .join(subdir)
            .join(native_path(key.filename()));
        sink.copy_file(source_path, &dest)?;
        record.source = Some(win_path_str([subdir, key.filename()]));
    }
    Ok(manifest)
}

/// Write every package of a bundle, plus an index when there are several.
///
/// Manifests are only written once every file has been copied, and not at
/// all after an interrupt.
fn write_bundle(
    bundle: Bundle,
    sources: &BTreeMap<String, BTreeMap<AssetKey, PathBuf>>,
    sink: &mut dyn OutputSink,
    interrupt: &Interrupt,
) -> Result<()> {
    let names: Vec<String> = bundle.names().map(str::to_string).collect();
    let packages = bundle.into_packages();
    let empty = BTreeMap::new();

    let mut index = Vec::new();
    let mut manifests = Vec::new();
    for (name, package) in names.iter().zip(&packages) {
        let prefix = match &package.name {
            Some(subpackage) => {
                tracing::info!("Writing subpackage '{}'...", subpackage);
                index.push(SubpackageRef::new(
                    subpackage.clone(),
                    win_path_str([subpackage.as_str(), MANIFEST_FILE_NAME]),
                ));
                subpackage.as_str()
            }
            None => {
                tracing::info!("Writing package...");
                ""
            }
        };
        let resolved = sources.get(name).unwrap_or(&empty);
        let manifest = copy_package(sink, package, resolved, interrupt)?;
        manifests.push((Path::new(prefix).join(MANIFEST_FILE_NAME), manifest));
    }

    interrupt.check()?;
    for (path, manifest) in &manifests {
        sink.write_text(path, &manifest.to_yaml()?)?;
    }
    if !index.is_empty() {
        let document = PackageDocument::index(index);
        sink.write_text(Path::new(MANIFEST_FILE_NAME), &document.to_yaml()?)?;
    } else if packages.is_empty() {
        tracing::warn!("Nothing to package.");
        sink.write_text(Path::new(MANIFEST_FILE_NAME), &Manifest::new().to_yaml()?)?;
    }
    Ok(())
}

/// Find the interpreter for import introspection.
///
/// An interpreter named explicitly must exist; otherwise PATH is searched
/// and a missing interpreter only disables script closures.
fn resolve_interpreter(requested: Option<&Path>) -> Result<Option<PathBuf>> {
    match requested {
        Some(path) if path.is_file() => Ok(Some(path.to_path_buf())),
        Some(path) => match find_executable(&path.to_string_lossy()) {
            Some(found) => Ok(Some(found)),
            None => bail!("Python interpreter '{}' does not exist", path.display()),
        },
        None => {
            let found = find_python_interpreter();
            if found.is_none() {
                tracing::warn!("Could not find a Python 2 interpreter.");
            }
            Ok(found)
        }
    }
}

/// Run the package command.
pub fn package(opts: &PackageOptions, interrupt: &Interrupt) -> Result<PackageReport> {
    let start = Instant::now();
    let layout = ContentLayout::new(&opts.source, opts.scripts.as_deref())?;

    let page_reader = opts
        .page_reader
        .as_ref()
        .map(|program| ExternalPageReader::new(program, opts.page_reader_args.clone()));

    let mut introspector = None;
    if opts.script_dependencies {
        let interpreter = resolve_interpreter(opts.python.as_deref())?;
        match (interpreter, &opts.py_tools) {
            (Some(interpreter), Some(tools)) => {
                if !tools.is_file() {
                    bail!("import introspection tool '{}' does not exist", tools.display());
                }
                introspector = Some(ExternalIntrospector::new(interpreter, tools));
            }
            (Some(_), None) => {
                tracing::warn!("No import introspection tool configured (see --py-tools).");
            }
            (None, _) => {}
        }
    }

    let pool = WorkerPool::new(opts.jobs, interrupt.clone())?.with_progress(opts.progress);
    tracing::debug!("Using {} worker thread(s)", pool.jobs());
    let assembler = PackageAssembler::new(
        layout,
        pool,
        page_reader.as_ref().map(|r| r as &dyn PageReader),
        introspector.as_ref().map(|i| i as &dyn ModuleIntrospector),
        opts,
    );
    let report = assembler
        .run(&opts.destination)
        .with_context(|| format!("failed to package '{}'", opts.source.display()))?;

    tracing::debug!(
        "Packaged {} asset(s) in {} package(s) in {:.2}s",
        report.assets,
        report.packages,
        start.elapsed().as_secs_f64()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AssetRecord;
    use crate::resolver::IntrospectionOutcome;
    use crate::util::hash::hash_bytes;
    use crate::util::interrupt::Interrupted;
    use crate::util::output::InterruptingSink;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    /// Every page uses the script module named after its world.
    struct WorldScriptReader;

    impl PageReader for WorldScriptReader {
        fn read_externals(&self, page: &Path) -> Result<Manifest> {
            let name = page.file_name().unwrap().to_string_lossy().into_owned();
            if name.contains("Broken") {
                bail!("cannot read page");
            }
            let world = name.split("_District_").next().unwrap().to_string();
            let mut fragment = Manifest::new();
            fragment.insert(
                AssetKey::new(AssetCategory::Python, format!("x{}.py", world)),
                crate::core::AssetRecord::with_options(["pfm"]),
            );
            fragment.insert(
                AssetKey::new(AssetCategory::Sfx, "bird.ogg"),
                crate::core::AssetRecord::with_options(["sound_stream"]),
            );
            Ok(fragment)
        }
    }

    /// `xGarden` imports `xGardenHelper`; everything else is unknown.
    struct FixedIntrospector {
        python_dir: PathBuf,
    }

    impl ModuleIntrospector for FixedIntrospector {
        fn introspect(&self, module: &str, _roots: &[&Path]) -> Result<IntrospectionOutcome> {
            Ok(match module {
                "xGarden" => IntrospectionOutcome::Success(vec![
                    self.python_dir.join("xGarden.py"),
                    self.python_dir.join("xGardenHelper.py"),
                    self.python_dir.join("plasma").join("Plasma.py"),
                ]),
                _ => IntrospectionOutcome::NotFound,
            })
        }
    }

    fn client_tree(root: &Path) {
        write(&root.join("dat").join("Garden.age"), "SequencePrefix=5\nPage=Garden,1\nPage=Broken,2\n");
        write(&root.join("dat").join("Garden.fni"), "fog");
        write(&root.join("dat").join("Garden_District_Garden.prp"), "page");
        write(&root.join("dat").join("Garden_District_Broken.prp"), "broken");
        write(&root.join("dat").join("Garden_District_Textures.prp"), "textures");
        // BuiltIn page is missing on purpose.
        write(&root.join("Python").join("xGarden.py"), "import xGardenHelper");
        write(&root.join("Python").join("xGardenHelper.py"), "");
        write(&root.join("SDL").join("xGarden.sdl"), "STATEDESC xGarden\n{\n VERSION 1\n VAR $GardenBug bugs[1]\n}\n");
        write(&root.join("SDL").join("GardenBug.sdl"), "STATEDESC GardenBug\n{\n VERSION 1\n VAR INT n[1]\n}\n");
        write(&root.join("sfx").join("bird.ogg"), "tweet");
    }

    fn run(root: &Path, dest: &Path, opts: &PackageOptions) -> PackageReport {
        let layout = ContentLayout::new(root, None).unwrap();
        let pool = WorkerPool::new(Some(2), Interrupt::new()).unwrap();
        let introspector = FixedIntrospector {
            python_dir: root.join("Python"),
        };
        PackageAssembler::new(layout, pool, Some(&WorldScriptReader), Some(&introspector), opts)
            .run(dest)
            .unwrap()
    }

    #[test]
    fn test_world_package_end_to_end() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("client");
        client_tree(&root);
        let dest = tmp.path().join("out");

        let opts = PackageOptions {
            include_client: false,
            ..PackageOptions::default()
        };
        let report = run(&root, &dest, &opts);
        assert_eq!(report.packages, 1);
        assert_eq!(report.missing, 0);
        assert_eq!(report.failed_tasks, 1);
        assert!(report.is_success());

        let manifest = Manifest::from_yaml(
            &fs::read_to_string(dest.join(MANIFEST_FILE_NAME)).unwrap(),
            "contents.yml",
        )
        .unwrap();
        for (category, file) in [
            (AssetCategory::Data, "Garden.age"),
            (AssetCategory::Data, "Garden.fni"),
            (AssetCategory::Data, "Garden_District_Garden.prp"),
            (AssetCategory::Data, "Garden_District_Textures.prp"),
            (AssetCategory::Python, "xGarden.py"),
            (AssetCategory::Python, "xGardenHelper.py"),
            (AssetCategory::Sdl, "xGarden.sdl"),
            (AssetCategory::Sdl, "GardenBug.sdl"),
            (AssetCategory::Sfx, "bird.ogg"),
        ] {
            assert!(manifest.find(category, file).is_some(), "{} {}", category, file);
        }
        assert!(manifest.find(AssetCategory::Python, "plasma/Plasma.py").is_none());

        let bird = manifest.find(AssetCategory::Sfx, "bird.ogg").unwrap();
        assert_eq!(bird.source.as_deref(), Some("GameAudio\\bird.ogg"));
        assert_eq!(bird.size, Some(5));
        assert_eq!(bird.dataset, Some(Dataset::Base));
        assert_eq!(bird.distribute, Some(Distribute::True));
        assert_eq!(bird.hash_fast.as_deref(), Some(hash_bytes(b"tweet", HashKind::Fast).as_str()));
        assert_eq!(
            bird.hash_strong.as_deref(),
            Some(hash_bytes(b"tweet", HashKind::Strong).as_str())
        );
        assert!(bird.options.contains("sound_stream"));

        assert_eq!(fs::read_to_string(dest.join("GameAudio").join("bird.ogg")).unwrap(), "tweet");
        assert!(dest.join("GameState").join("GardenBug.sdl").is_file());
    }

    #[test]
    fn test_missing_assets_are_pruned_and_reported() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("client");
        client_tree(&root);
        fs::remove_file(root.join("sfx").join("bird.ogg")).unwrap();
        let dest = tmp.path().join("out");

        let opts = PackageOptions {
            include_client: false,
            script_dependencies: false,
            ..PackageOptions::default()
        };
        let report = run(&root, &dest, &opts);
        assert_eq!(report.missing, 1);
        assert!(!report.is_success());

        let manifest = Manifest::from_yaml(
            &fs::read_to_string(dest.join(MANIFEST_FILE_NAME)).unwrap(),
            "contents.yml",
        )
        .unwrap();
        assert_eq!(manifest.category_len(AssetCategory::Sfx), 0);
        // Without closures the helper module and descriptors are not found.
        assert!(manifest.find(AssetCategory::Python, "xGardenHelper.py").is_none());
        assert_eq!(manifest.category_len(AssetCategory::Sdl), 0);
    }

    #[test]
    fn test_client_package_makes_subpackages() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("client");
        client_tree(&root);
        write(&root.join("plClient.exe"), "exe");
        write(&root.join("Python").join("plasma").join("Plasma.py"), "");
        write(&root.join("SDL").join("Avatar.sdl"), "STATEDESC Avatar\n{\n VERSION 2\n}\n");
        let dest = tmp.path().join("out");

        let opts = PackageOptions {
            client_descriptors: vec!["Avatar".to_string(), "Layer".to_string()],
            dataset: Dataset::Contrib,
            ..PackageOptions::default()
        };
        let report = run(&root, &dest, &opts);
        assert_eq!(report.packages, 2);

        let index = PackageDocument::load(&dest.join(MANIFEST_FILE_NAME)).unwrap();
        let sources: Vec<_> = index
            .subpackages
            .iter()
            .filter_map(|s| s.source.as_deref())
            .collect();
        assert_eq!(sources, ["Client\\contents.yml", "Garden\\contents.yml"]);

        let client = Manifest::from_yaml(
            &fs::read_to_string(dest.join("Client").join(MANIFEST_FILE_NAME)).unwrap(),
            "Client/contents.yml",
        )
        .unwrap();
        let exe = client.find(AssetCategory::Artifacts, "plClient.exe").unwrap();
        assert_eq!(exe.dataset, Some(Dataset::Contrib));
        assert_eq!(exe.source.as_deref(), Some("Client\\plClient.exe"));
        assert!(client.find(AssetCategory::Sdl, "Avatar.sdl").is_some());
        assert!(client.find(AssetCategory::Python, "plasma/Plasma.py").is_some());
        assert!(dest.join("Client").join("Client").join("plClient.exe").is_file());
        assert!(dest.join("Garden").join("GameData").join("Garden.age").is_file());
    }

    #[test]
    fn test_interrupt_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("client");
        client_tree(&root);
        let dest = tmp.path().join("out");

        let interrupt = Interrupt::new();
        interrupt.trigger();
        let layout = ContentLayout::new(&root, None).unwrap();
        let pool = WorkerPool::new(Some(2), interrupt).unwrap();
        let opts = PackageOptions::default();
        let result = PackageAssembler::new(layout, pool, Some(&WorldScriptReader), None, &opts).run(&dest);

        assert!(result.is_err());
        assert!(!dest.join(MANIFEST_FILE_NAME).exists());
    }

    #[test]
    fn test_missing_single_age_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("client");
        client_tree(&root);
        let opts = PackageOptions {
            ages: AgeSelection::Single("Teledahn".to_string()),
            ..PackageOptions::default()
        };
        let layout = ContentLayout::new(&root, None).unwrap();
        let pool = WorkerPool::new(Some(1), Interrupt::new()).unwrap();
        let result = PackageAssembler::new(layout, pool, None, None, &opts).run(&tmp.path().join("out"));
        assert!(result.is_err());
    }

    #[test]
    fn test_unhashed_records_are_dropped() {
        let hashed = AssetRecord {
            hash_fast: Some("fast".to_string()),
            hash_strong: Some("strong".to_string()),
            ..AssetRecord::default()
        };
        let half = AssetRecord {
            hash_fast: Some("fast".to_string()),
            ..AssetRecord::default()
        };
        let optional = AssetRecord {
            optional: true,
            ..AssetRecord::default()
        };
        let good = AssetKey::new(AssetCategory::Sfx, "bird.ogg");
        let bad = AssetKey::new(AssetCategory::Sfx, "frog.ogg");
        let maybe = AssetKey::new(AssetCategory::Sfx, "owl.ogg");
        let lost = AssetKey::new(AssetCategory::Data, "Lost.age");

        let mut bundle = Bundle::new();
        let garden = bundle.package_mut("Garden");
        garden.insert(good.clone(), hashed);
        garden.insert(bad.clone(), half);
        garden.insert(maybe.clone(), optional);
        bundle.package_mut("Lost").insert(lost.clone(), AssetRecord::new());

        let mut sources = BTreeMap::new();
        let placed = [("Garden", &good), ("Garden", &bad), ("Garden", &maybe), ("Lost", &lost)];
        for (package, key) in placed {
            sources
                .entry(package.to_string())
                .or_insert_with(BTreeMap::new)
                .insert(key.clone(), PathBuf::from("unused"));
        }

        assert_eq!(drop_unhashed(&mut bundle, &mut sources), 2);
        assert_eq!(bundle.names().collect::<Vec<_>>(), ["Garden"]);
        assert_eq!(bundle.asset_count(), 1);
        assert!(bundle.package_mut("Garden").get(&good).is_some());
        assert_eq!(sources["Garden"].keys().collect::<Vec<_>>(), [&good]);
        assert!(sources["Lost"].is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_asset_is_reported_missing() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("client");
        client_tree(&root);
        let bird = root.join("sfx").join("bird.ogg");
        fs::set_permissions(&bird, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::File::open(&bird).is_ok() {
            // Permissions do not apply to this user.
            return;
        }
        let dest = tmp.path().join("out");

        let opts = PackageOptions {
            include_client: false,
            ..PackageOptions::default()
        };
        let report = run(&root, &dest, &opts);
        assert_eq!(report.missing, 1);
        assert!(!report.is_success());

        let manifest = Manifest::from_yaml(
            &fs::read_to_string(dest.join(MANIFEST_FILE_NAME)).unwrap(),
            "contents.yml",
        )
        .unwrap();
        assert!(manifest.find(AssetCategory::Sfx, "bird.ogg").is_none());
        assert!(manifest.find(AssetCategory::Data, "Garden.age").is_some());
    }

    #[test]
    fn test_interrupt_during_write_leaves_no_manifest() {
        let tmp = TempDir::new().unwrap();
        let mut bundle = Bundle::new();
        let mut sources = BTreeMap::new();
        for (package, file) in [("Client", "plClient.exe"), ("Garden", "Garden.age")] {
            let path = tmp.path().join(file);
            write(&path, file);
            let key = AssetKey::new(AssetCategory::Data, file);
            bundle.package_mut(package).insert(key.clone(), AssetRecord::new());
            sources
                .entry(package.to_string())
                .or_insert_with(BTreeMap::new)
                .insert(key, path);
        }

        // Interrupting after the last copy still stops before any manifest.
        for after in [1, 2] {
            let interrupt = Interrupt::new();
            let mut sink = InterruptingSink::new(interrupt.clone(), after);
            let err = write_bundle(bundle.clone(), &sources, &mut sink, &interrupt).unwrap_err();
            assert!(err.is::<Interrupted>());
            assert_eq!(sink.copies, after);
            assert!(sink.texts.is_empty());
        }

        let mut sink = InterruptingSink::new(Interrupt::new(), 0);
        write_bundle(bundle, &sources, &mut sink, &Interrupt::new()).unwrap();
        assert_eq!(sink.copies, 2);
        assert_eq!(
            sink.texts,
            [
                Path::new("Client").join(MANIFEST_FILE_NAME),
                Path::new("Garden").join(MANIFEST_FILE_NAME),
                PathBuf::from(MANIFEST_FILE_NAME),
            ]
        );
    }
}
