//! State descriptor sources and their dependency closure.
//!
//! A state descriptor is a named, versioned list of synchronized variables.
//! A variable whose type is written `$Other` embeds the descriptor `Other`,
//! so packaging one descriptor means packaging the files of everything it
//! embeds, transitively.
//!
//! ```text
//! STATEDESC Garden
//! {
//!     VERSION 3
//!     VAR BOOL        bugsVisible[1]  DEFAULT=1
//!     VAR $GardenBug  bugs[]
//! }
//! ```

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::sources::crypt::is_encrypted;
use crate::util::fs::{glob_files, read_to_string};

static STATEDESC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^STATEDESC\s+(\w+)").expect("valid regex"));
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^VERSION\s+(\d+)").expect("valid regex"));
static VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^VAR\s+(\$?\w+)\s+(\w+)").expect("valid regex"));

/// Type of a descriptor variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarType {
    /// A plain value type such as `INT` or `PLKEY`
    Simple(String),
    /// An embedded descriptor, referenced by name
    StateDescriptor(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDescriptor {
    pub name: String,
    pub var_type: VarType,
}

impl VarDescriptor {
    /// Name of the embedded descriptor, if this variable embeds one.
    pub fn embedded_descriptor(&self) -> Option<&str> {
        match &self.var_type {
            VarType::StateDescriptor(name) => Some(name),
            VarType::Simple(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDescriptor {
    pub name: String,
    pub version: u32,
    pub variables: Vec<VarDescriptor>,
}

/// Anything that can look descriptors up by name.
pub trait DescriptorSource: Sync {
    /// File name recorded as the dependency when a descriptor is found here.
    fn file_name(&self) -> &str;

    /// Find the newest version of a descriptor.
    fn lookup(&self, name: &str) -> Option<&StateDescriptor>;
}

/// Descriptors parsed from one `.sdl` file.
#[derive(Debug, Clone, Default)]
pub struct SdlFile {
    file_name: String,
    descriptors: HashMap<String, StateDescriptor>,
}

impl SdlFile {
    /// Parse descriptor text. Only the newest version of each descriptor
    /// is kept.
    pub fn parse(file_name: impl Into<String>, text: &str) -> Self {
        let mut descriptors: HashMap<String, StateDescriptor> = HashMap::new();
        let mut current: Option<StateDescriptor> = None;

        for raw_line in text.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            for segment in line.split('{').map(str::trim).filter(|s| !s.is_empty()) {
                if let Some(caps) = STATEDESC_RE.captures(segment) {
                    if let Some(open) = current.take() {
                        keep_newest(open, &mut descriptors);
                    }
                    current = Some(StateDescriptor {
                        name: caps[1].to_string(),
                        version: 0,
                        variables: Vec::new(),
                    });
                } else if let Some(descriptor) = current.as_mut() {
                    if let Some(caps) = VERSION_RE.captures(segment) {
                        descriptor.version = caps[1].parse().unwrap_or(0);
                    } else if let Some(caps) = VAR_RE.captures(segment) {
                        let type_name = &caps[1];
                        let var_type = match type_name.strip_prefix('$') {
                            Some(embedded) => VarType::StateDescriptor(embedded.to_string()),
                            None => VarType::Simple(type_name.to_string()),
                        };
                        descriptor.variables.push(VarDescriptor {
                            name: caps[2].to_string(),
                            var_type,
                        });
                    }
                }
            }

            if line.contains('}') {
                if let Some(closed) = current.take() {
                    keep_newest(closed, &mut descriptors);
                }
            }
        }
        if let Some(open) = current.take() {
            keep_newest(open, &mut descriptors);
        }

        SdlFile {
            file_name: file_name.into(),
            descriptors,
        }
    }

    /// Read and parse a descriptor file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = read_to_string(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(SdlFile::parse(file_name, &text))
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl DescriptorSource for SdlFile {
    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn lookup(&self, name: &str) -> Option<&StateDescriptor> {
        self.descriptors.get(&name.to_lowercase())
    }
}

fn keep_newest(descriptor: StateDescriptor, descriptors: &mut HashMap<String, StateDescriptor>) {
    let key = descriptor.name.to_lowercase();
    match descriptors.get(&key) {
        Some(existing) if existing.version >= descriptor.version => {}
        _ => {
            descriptors.insert(key, descriptor);
        }
    }
}

/// Load every readable descriptor file in a directory.
///
/// Encrypted or unreadable files are reported and skipped.
pub fn load_descriptor_sources(dir: &Path) -> Result<Vec<SdlFile>> {
    let mut sources = Vec::new();
    for path in glob_files(dir, "*.sdl")? {
        match is_encrypted(&path) {
            Ok(true) => {
                tracing::error!(
                    "SDL file '{}' is encrypted and cannot be used for packaging.",
                    display_name(&path)
                );
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!("{:#}", e);
                continue;
            }
        }
        match SdlFile::load(&path) {
            Ok(file) => sources.push(file),
            Err(e) => tracing::error!("{:#}", e),
        }
    }
    tracing::debug!("Loaded {} SDL file(s) from {}", sources.len(), dir.display());
    Ok(sources)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Result of a descriptor closure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorClosure {
    /// Files defining the required descriptors
    pub files: BTreeSet<String>,
    /// Every descriptor name that was looked up, lowercased
    pub visited: BTreeSet<String>,
    /// Descriptors that no source defines
    pub missing: BTreeSet<String>,
}

/// Compute the descriptor files transitively required by `roots`.
///
/// Sources are searched in order and the first one defining a name wins.
/// A root that no source defines is unremarkable (most scripts have no
/// state), but a missing embedded descriptor is an error.
pub fn resolve_descriptors<'a, S, I>(sources: &[S], roots: I) -> DescriptorClosure
where
    S: DescriptorSource,
    I: IntoIterator<Item = &'a str>,
{
    let mut closure = DescriptorClosure::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut worklist: VecDeque<(String, bool)> = VecDeque::new();

    for root in roots {
        if seen.insert(root.to_lowercase()) {
            worklist.push_back((root.to_string(), false));
        }
    }

    while let Some((name, embedded)) = worklist.pop_front() {
        let found = sources
            .iter()
            .find_map(|source| source.lookup(&name).map(|d| (source, d)));

        let Some((source, descriptor)) = found else {
            if embedded {
                tracing::error!("Embedded SDL descriptor '{}' is missing from the client.", name);
            } else {
                tracing::debug!("Top-level SDL '{}' is missing from the client.", name);
            }
            closure.missing.insert(name.to_lowercase());
            continue;
        };

        closure.files.insert(source.file_name().to_string());
        for variable in &descriptor.variables {
            if let Some(embedded_name) = variable.embedded_descriptor() {
                if seen.insert(embedded_name.to_lowercase()) {
                    worklist.push_back((embedded_name.to_string(), true));
                }
            }
        }
    }

    closure.visited = seen.into_iter().collect();
    closure
}
