//! `hurudist merge` command

use std::path::Path;

use anyhow::Result;

use crate::cli::MergeArgs;
use hurudist::ops::hurudist_merge::{merge, MergeOptions};
use hurudist::util::config::{global_config_path, load_config, PROJECT_CONFIG_NAME};
use hurudist::util::interrupt::Interrupt;

pub fn execute(args: MergeArgs, interrupt: &Interrupt) -> Result<bool> {
    let global = global_config_path();
    let config = load_config(global.as_deref(), Path::new(PROJECT_CONFIG_NAME));

    let opts = MergeOptions {
        sources: args.sources,
        destination: args.destination,
        preserve_subpackages: args.preserve_subpackages,
        dataset: args.dataset.or(config.package.dataset).unwrap_or_default(),
        distribute: args.distribute.or(config.package.distribute).unwrap_or_default(),
    };

    let report = merge(&opts, interrupt)?;

    tracing::info!("Merged {} asset(s) into {}", report.assets, opts.destination.display());
    if !report.conflicts.is_empty() {
        tracing::warn!("{} asset(s) were discarded as conflicting", report.conflicts.len());
    }
    if report.missing > 0 {
        tracing::error!("{} required asset(s) are missing from the source packages", report.missing);
    }
    Ok(report.missing == 0)
}
