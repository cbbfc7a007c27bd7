//! Configuration file support for HuruDist.
//!
//! HuruDist reads two optional configuration files:
//! - Global: `~/.hurudist/config.toml` - User-wide defaults
//! - Project: `./hurudist.toml` - Overrides for the current directory
//!
//! Project config takes precedence over global config, and command-line
//! flags take precedence over both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::{Dataset, Distribute};

/// File name of the project configuration.
pub const PROJECT_CONFIG_NAME: &str = "hurudist.toml";

/// State descriptors every client needs for its synched engine objects.
pub const DEFAULT_CLIENT_DESCRIPTORS: &[&str] = &[
    "AGMaster",
    "Avatar",
    "AvatarPhysical",
    "CloneMessage",
    "Clothing",
    "Layer",
    "MorphSequence",
    "ParticleSystem",
    "Physical",
    "Responder",
    "Sound",
    "XRegion",
];

/// HuruDist configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Script interpreter settings
    pub python: PythonConfig,

    /// Page scanning settings
    pub scan: ScanConfig,

    /// Defaults stamped onto packaged and merged assets
    pub package: PackageConfig,

    /// Client file settings
    pub client: ClientConfig,
}

/// Script interpreter settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PythonConfig {
    /// Interpreter used to introspect script imports
    pub interpreter: Option<PathBuf>,

    /// Path to the import introspection tool
    pub tools: Option<PathBuf>,
}

/// Page scanning settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Program that lists the external references of a page
    pub page_reader: Option<PathBuf>,

    /// Extra arguments passed before the page path
    pub page_reader_args: Vec<String>,

    /// Worker count (None = available parallelism)
    pub jobs: Option<usize>,
}

/// Defaults stamped onto packaged and merged assets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    pub dataset: Option<Dataset>,
    pub distribute: Option<Distribute>,
    pub client_arch: Option<String>,
}

/// Client file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// State descriptors required by the engine itself
    pub sdl_descriptors: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            sdl_descriptors: DEFAULT_CLIENT_DESCRIPTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Tracks whether a client section was present, so merging does not clobber
/// the global descriptor list with the built-in default.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    client: Option<toml::Value>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config, other_has_client: bool) {
        if other.python.interpreter.is_some() {
            self.python.interpreter = other.python.interpreter;
        }
        if other.python.tools.is_some() {
            self.python.tools = other.python.tools;
        }

        if other.scan.page_reader.is_some() {
            self.scan.page_reader = other.scan.page_reader;
            self.scan.page_reader_args = other.scan.page_reader_args;
        }
        if other.scan.jobs.is_some() {
            self.scan.jobs = other.scan.jobs;
        }

        if other.package.dataset.is_some() {
            self.package.dataset = other.package.dataset;
        }
        if other.package.distribute.is_some() {
            self.package.distribute = other.package.distribute;
        }
        if other.package.client_arch.is_some() {
            self.package.client_arch = other.package.client_arch;
        }

        if other_has_client {
            self.client = other.client;
        }
    }
}

fn has_client_section(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|text| toml::from_str::<RawConfig>(&text).ok())
        .map(|raw| raw.client.is_some())
        .unwrap_or(false)
}

/// Get the global config path (`~/.hurudist/config.toml`).
pub fn global_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".hurudist").join("config.toml"))
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (./hurudist.toml)
/// 2. Global config (~/.hurudist/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    for path in global_path.into_iter().chain(std::iter::once(project_path)) {
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let loaded = Config::load_or_default(path);
            config.merge(loaded, has_client_section(path));
        }
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.python.interpreter.is_none());
        assert!(config.scan.page_reader.is_none());
        assert!(config.package.dataset.is_none());
        assert_eq!(
            config.client.sdl_descriptors.len(),
            DEFAULT_CLIENT_DESCRIPTORS.len()
        );
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("hurudist.toml");

        std::fs::write(
            &config_path,
            r#"
[python]
interpreter = "/usr/bin/python2.7"

[scan]
page_reader = "prp-externals"
page_reader_args = ["--json"]
jobs = 8

[package]
dataset = "contrib"
distribute = false
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(
            config.python.interpreter,
            Some(PathBuf::from("/usr/bin/python2.7"))
        );
        assert_eq!(config.scan.page_reader_args, vec!["--json"]);
        assert_eq!(config.scan.jobs, Some(8));
        assert_eq!(config.package.dataset, Some(Dataset::Contrib));
        assert_eq!(config.package.distribute, Some(Distribute::False));
    }

    #[test]
    fn test_load_config_precedence() {
        let tmp = TempDir::new().unwrap();
        let global_path = tmp.path().join("global.toml");
        let project_path = tmp.path().join("project.toml");

        std::fs::write(
            &global_path,
            r#"
[scan]
jobs = 2

[package]
dataset = "cyan"

[client]
sdl_descriptors = ["Avatar"]
"#,
        )
        .unwrap();
        std::fs::write(
            &project_path,
            r#"
[package]
dataset = "override"
"#,
        )
        .unwrap();

        let config = load_config(Some(&global_path), &project_path);
        assert_eq!(config.package.dataset, Some(Dataset::Override));
        assert_eq!(config.scan.jobs, Some(2));
        // Project file has no [client] section, so the global list survives.
        assert_eq!(config.client.sdl_descriptors, vec!["Avatar"]);
    }

    #[test]
    fn test_load_config_missing_files() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(None, &tmp.path().join("absent.toml"));
        assert!(config.scan.jobs.is_none());
    }
}
