//! `hurudist completions` command

use std::fs::File;
use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::generate;

use crate::cli::{Cli, CompletionsArgs};

pub fn execute(args: CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("failed to create '{}'", path.display()))?,
        ),
        None => Box::new(io::stdout()),
    };
    generate(args.shell, &mut cmd, "hurudist", &mut out);
    out.flush()?;

    if let Some(path) = &args.output {
        tracing::info!("Wrote {} completions to {}", args.shell, path.display());
    }
    Ok(())
}
