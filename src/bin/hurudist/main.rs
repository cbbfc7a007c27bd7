//! HuruDist CLI - asset packaging for a modular virtual-world client

use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use hurudist::util::interrupt::{Interrupt, Interrupted};

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let start = Instant::now();
    let result = run(cli);
    let elapsed = start.elapsed().as_secs_f64();

    match result {
        Ok(true) => tracing::info!("HuruDist completed successfully in {:.2}s", elapsed),
        Ok(false) => {
            tracing::error!("HuruDist exiting with errors in {:.2}s", elapsed);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            tracing::error!("HuruDist exiting with errors in {:.2}s", elapsed);
            let code = if e.downcast_ref::<Interrupted>().is_some() {
                130
            } else {
                1
            };
            std::process::exit(code);
        }
    }
}

fn init_logging(cli: &Cli) {
    let default = if cli.verbose {
        "hurudist=debug"
    } else if cli.quiet {
        "hurudist=error"
    } else {
        "hurudist=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// Returns whether the command fully succeeded.
fn run(cli: Cli) -> Result<bool> {
    let progress = !cli.quiet;
    match cli.command {
        Commands::Package(args) => {
            let interrupt = Interrupt::install()?;
            commands::package::execute(args, progress, &interrupt)
        }
        Commands::Merge(args) => {
            let interrupt = Interrupt::install()?;
            commands::merge::execute(args, &interrupt)
        }
        Commands::Completions(args) => commands::completions::execute(args).map(|()| true),
    }
}
