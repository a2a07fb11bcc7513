//! RepoKeeper CLI Binary
//!
//! Command-line interface and service entry point for the audio library
//! directory cache.

use anyhow::Context;
use clap::Parser;
use repokeeper::logging::init_logging;
use repokeeper::tooling::cli::{Cli, CliContext, Commands};
use std::process;

fn run(cli: Cli) -> anyhow::Result<Option<String>> {
    let context = CliContext::new(cli.root.clone(), cli.config.clone())
        .context("Error initializing library configuration")?;

    let logging = cli.logging_config(&context.config().logging);
    init_logging(Some(&logging), context.config().root_dir.as_deref())
        .context("Error initializing logging")?;

    match &cli.command {
        Commands::Serve => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Error starting async runtime")?;
            runtime.block_on(context.serve())?;
            Ok(None)
        }
        command => Ok(Some(context.execute(command)?)),
    }
}

fn main() {
    let cli = Cli::parse();

    match run(cli) {
        Ok(Some(output)) => println!("{}", output),
        Ok(None) => {}
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
