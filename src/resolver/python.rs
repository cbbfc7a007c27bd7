//! Script module import closure.
//!
//! The import graph of a script module is only known to the engine's own
//! interpreter, so it is computed by an external introspection tool:
//!
//! ```text
//! <interpreter> <tool> get_imports <module> <scripts root> <scripts root>/plasma
//! ```
//!
//! On success the tool prints the absolute path of every module that was
//! loaded from one of the search roots, one per line. Failures are reported
//! through the exit code.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::util::fs::archive_path;
use crate::util::process::{combined_output, ProcessBuilder};

/// Exit codes of the introspection tool.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const TRACEBACK: i32 = 1;
    pub const INVALID_COMMAND: i32 = 2;
    pub const FILE_NOT_FOUND: i32 = 3;
}

/// Subdirectory of the scripts root holding engine-level modules. These
/// ship with the client and are never attributed to a world.
pub const BUILTIN_SCRIPTS_DIR: &str = "plasma";

/// Classified result of one introspection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntrospectionOutcome {
    /// Absolute paths of every imported file
    Success(Vec<PathBuf>),
    /// The module raised while being imported
    Traceback(String),
    /// The tool did not understand its command line
    InvalidCommand(String),
    /// The module does not exist on the search path
    NotFound,
    /// Any other exit status
    Unhandled { code: Option<i32>, output: String },
}

impl IntrospectionOutcome {
    /// Classify a finished tool run by exit code.
    pub fn from_exit(code: Option<i32>, stdout: &str, diagnostics: String) -> Self {
        match code {
            Some(exit_code::SUCCESS) => IntrospectionOutcome::Success(
                stdout
                    .lines()
                    .map(str::trim_end)
                    .filter(|line| !line.is_empty())
                    .map(PathBuf::from)
                    .collect(),
            ),
            Some(exit_code::TRACEBACK) => IntrospectionOutcome::Traceback(diagnostics),
            Some(exit_code::INVALID_COMMAND) => IntrospectionOutcome::InvalidCommand(diagnostics),
            Some(exit_code::FILE_NOT_FOUND) => IntrospectionOutcome::NotFound,
            code => IntrospectionOutcome::Unhandled {
                code,
                output: diagnostics,
            },
        }
    }
}

/// Computes the files a script module imports.
pub trait ModuleIntrospector: Send + Sync {
    fn introspect(&self, module: &str, search_roots: &[&Path]) -> Result<IntrospectionOutcome>;
}

/// Runs the introspection tool in a child interpreter process.
#[derive(Debug, Clone)]
pub struct ExternalIntrospector {
    interpreter: PathBuf,
    tool: PathBuf,
}

impl ExternalIntrospector {
    pub fn new(interpreter: impl Into<PathBuf>, tool: impl Into<PathBuf>) -> Self {
        ExternalIntrospector {
            interpreter: interpreter.into(),
            tool: tool.into(),
        }
    }

    fn command(&self, module: &str, search_roots: &[&Path]) -> ProcessBuilder {
        ProcessBuilder::new(&self.interpreter)
            .arg(&self.tool)
            .arg("get_imports")
            .arg(module)
            .args(search_roots)
    }
}

impl ModuleIntrospector for ExternalIntrospector {
    fn introspect(&self, module: &str, search_roots: &[&Path]) -> Result<IntrospectionOutcome> {
        let cmd = self.command(module, search_roots);
        tracing::trace!("Running: {}", cmd.display_command());
        let output = cmd.exec()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(IntrospectionOutcome::from_exit(
            output.status.code(),
            &stdout,
            combined_output(&output),
        ))
    }
}

/// Resolves script module closures below one scripts root.
pub struct ScriptResolver<'a> {
    introspector: &'a dyn ModuleIntrospector,
    scripts_root: PathBuf,
    builtin_root: PathBuf,
}

impl<'a> ScriptResolver<'a> {
    pub fn new(introspector: &'a dyn ModuleIntrospector, scripts_root: impl Into<PathBuf>) -> Self {
        let scripts_root = scripts_root.into();
        let builtin_root = scripts_root.join(BUILTIN_SCRIPTS_DIR);
        ScriptResolver {
            introspector,
            scripts_root,
            builtin_root,
        }
    }

    /// Files imported by `module`, relative to the scripts root.
    ///
    /// Engine-level modules and files outside the scripts root are left
    /// out. Any tool failure is logged and yields no files.
    pub fn module_dependencies(&self, module: &str) -> BTreeSet<String> {
        let roots = [self.scripts_root.as_path(), self.builtin_root.as_path()];
        let outcome = match self.introspector.introspect(module, &roots) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Could not introspect Python module {}: {:#}", module, e);
                return BTreeSet::new();
            }
        };

        match outcome {
            IntrospectionOutcome::Success(paths) => paths
                .iter()
                .filter_map(|path| self.script_relative(path))
                .collect(),
            IntrospectionOutcome::Traceback(output) => {
                tracing::error!("Python module {} failed to import\n{}", module, output.trim_end());
                BTreeSet::new()
            }
            IntrospectionOutcome::InvalidCommand(output) => {
                tracing::error!(
                    "Import introspection was invoked incorrectly for Python module {}\n{}",
                    module,
                    output.trim_end()
                );
                BTreeSet::new()
            }
            IntrospectionOutcome::NotFound => {
                tracing::warn!("Python module {} could not be found.", module);
                BTreeSet::new()
            }
            IntrospectionOutcome::Unhandled { code, output } => {
                let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                tracing::warn!(
                    "Unhandled error {} when importing Python module {}.\n{}",
                    code,
                    module,
                    output.trim_end()
                );
                BTreeSet::new()
            }
        }
    }

    /// Union of the closures of every module in `modules`.
    pub fn resolve<'m, I>(&self, modules: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'m str>,
    {
        let mut files = BTreeSet::new();
        for module in modules {
            files.extend(self.module_dependencies(module));
        }
        files
    }

    fn script_relative(&self, path: &Path) -> Option<String> {
        if path.starts_with(&self.builtin_root) {
            return None;
        }
        match path.strip_prefix(&self.scripts_root) {
            Ok(relative) => Some(archive_path(relative)),
            Err(_) => {
                tracing::trace!("Ignoring import outside the scripts root: {}", path.display());
                None
            }
        }
    }
}

/// Module name of a script file name (`xAgeSDLBoolShowHide.py`).
pub fn module_name(file_name: &str) -> &str {
    let base = file_name.rsplit('/').next().unwrap_or(file_name);
    base.rsplit_once('.').map_or(base, |(stem, _)| stem)
}
