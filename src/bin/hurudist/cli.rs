//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use hurudist::core::{Dataset, Distribute};

/// HuruDist - package client content into distributable manifests
#[derive(Parser)]
#[command(name = "hurudist")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Package a client content root
    Package(PackageArgs),

    /// Merge existing packages into one
    Merge(MergeArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct PackageArgs {
    /// Client content root
    pub source: PathBuf,

    /// Output directory, `.zip` or `.tar.gz`
    pub destination: PathBuf,

    /// Package a single age
    #[arg(long, conflicts_with = "no_ages")]
    pub age: Option<String>,

    /// Do not package any ages
    #[arg(long)]
    pub no_ages: bool,

    /// Do not package client files
    #[arg(long)]
    pub no_client: bool,

    /// Do not resolve state descriptors and script imports
    #[arg(long)]
    pub skip_script_dependencies: bool,

    /// Separate root holding Python and SDL directories
    #[arg(long)]
    pub scripts: Option<PathBuf>,

    /// Python 2 interpreter used to introspect imports
    #[arg(long, env = "HURUDIST_PYTHON")]
    pub python: Option<PathBuf>,

    /// Import introspection tool
    #[arg(long)]
    pub py_tools: Option<PathBuf>,

    /// Program listing the external references of a page
    #[arg(long)]
    pub page_reader: Option<PathBuf>,

    /// Dataset assigned to assets that do not declare one
    #[arg(long)]
    pub dataset: Option<Dataset>,

    /// Distribution flag assigned to assets that do not declare one
    #[arg(long)]
    pub distribute: Option<Distribute>,

    /// Architecture recorded for client files
    #[arg(long)]
    pub client_arch: Option<String>,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct MergeArgs {
    /// Package directories to merge
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,

    /// Output directory, `.zip` or `.tar.gz`
    #[arg(short, long)]
    pub destination: PathBuf,

    /// Keep subpackages instead of flattening them
    #[arg(long)]
    pub preserve_subpackages: bool,

    /// Dataset assigned to assets that do not declare one
    #[arg(long)]
    pub dataset: Option<Dataset>,

    /// Distribution flag assigned to assets that do not declare one
    #[arg(long)]
    pub distribute: Option<Distribute>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,

    /// Write the script to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
