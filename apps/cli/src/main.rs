//! zfbackup: command-line front end for the exporter

mod args;

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use args::Cli;
use exporter::{ConsoleProgressReporter, Exporter, IntoProgressCallback};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let config = cli.export_config().context("invalid configuration")?;
    tracing::debug!(?config, "Resolved configuration");
    println!("Exporting account '{}' to {}", config.login_name, config.download_folder.display());

    let mut exporter = Exporter::new(config).context("could not set up HTTP client")?;
    if !cli.quiet {
        exporter = exporter.with_progress(ConsoleProgressReporter::new(cli.verbose).into_callback());
    }

    let summary = exporter.run().await.context("export aborted")?;
    for line in summary.report_lines() {
        println!("{line}");
    }

    Ok(ExitCode::SUCCESS)
}
