use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use lagsync::{
    config::{read_config, CliArgs, SyncConfig},
    progress::ConsoleObserver,
    run_sync, RsyncRunner,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args = CliArgs::parse();

    setup_logging(args.verbose);

    let file = read_config(args.config.as_deref())?;
    let config = SyncConfig::resolve(args, file).context("Invalid configuration")?;

    let runner = RsyncRunner::new(config.timeout);
    let observer = ConsoleObserver::stdout();
    run_sync(&config, &runner, &observer)
        .await
        .with_context(|| format!("Sync of {} failed", config.root.display()))?;

    Ok(())
}

// Logs go to stderr so that a dry run leaves stdout to the command preview
fn setup_logging(verbose: bool) {
    let default = if verbose {
        "lagsync=debug,warn"
    } else {
        "lagsync=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
