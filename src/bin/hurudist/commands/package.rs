//! `hurudist package` command

use std::path::Path;

use anyhow::Result;

use crate::cli::PackageArgs;
use hurudist::ops::hurudist_package::{package, AgeSelection, PackageOptions};
use hurudist::sources::client::default_client_arch;
use hurudist::util::config::{global_config_path, load_config, PROJECT_CONFIG_NAME};
use hurudist::util::interrupt::Interrupt;

pub fn execute(args: PackageArgs, progress: bool, interrupt: &Interrupt) -> Result<bool> {
    // Load configuration (global + project)
    let global = global_config_path();
    let config = load_config(global.as_deref(), Path::new(PROJECT_CONFIG_NAME));

    let ages = match (args.no_ages, args.age) {
        (true, _) => AgeSelection::None,
        (false, Some(name)) => AgeSelection::Single(name),
        (false, None) => AgeSelection::All,
    };

    // CLI > config > default
    let opts = PackageOptions {
        source: args.source,
        destination: args.destination,
        scripts: args.scripts,
        ages,
        include_client: !args.no_client,
        script_dependencies: !args.skip_script_dependencies,
        python: args.python.or(config.python.interpreter),
        py_tools: args.py_tools.or(config.python.tools),
        page_reader: args.page_reader.or(config.scan.page_reader),
        page_reader_args: config.scan.page_reader_args,
        dataset: args.dataset.or(config.package.dataset).unwrap_or_default(),
        distribute: args.distribute.or(config.package.distribute).unwrap_or_default(),
        client_arch: args
            .client_arch
            .or(config.package.client_arch)
            .unwrap_or_else(|| default_client_arch().to_string()),
        client_descriptors: config.client.sdl_descriptors,
        jobs: args.jobs.or(config.scan.jobs),
        progress,
    };

    let report = package(&opts, interrupt)?;

    tracing::info!(
        "Packaged {} asset(s) in {} package(s) into {}",
        report.assets,
        report.packages,
        opts.destination.display()
    );
    if report.missing > 0 {
        tracing::error!("{} required asset(s) are missing from the client", report.missing);
    }
    Ok(report.is_success())
}
