mod cli;
mod commands;
mod config;

use std::process;

use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::{Args, Commands, LogFormat},
    commands::{CommandExecutor, RunOptions},
    config::AppConfig,
};

const DEFAULT_FILTER: &str = "farewatch=info,fare_pipeline=info,wingo_client=info";
const VERBOSE_FILTER: &str = "farewatch=debug,fare_pipeline=debug,wingo_client=debug";

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    if let Err(e) = init_logging(args.verbose, args.quiet, args.log_format) {
        eprintln!("Failed to initialise logging: {e}");
    }

    if let Err(e) = run(args).await {
        error!("Application error: {e:#}");
        eprintln!("{} {e:#}", "Error:".red().bold());
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = AppConfig::load(args.config.as_deref())?;

    let token = CancellationToken::new();
    tokio::spawn({
        let token = token.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling run");
                token.cancel();
            }
        }
    });

    let executor = CommandExecutor::new(config, token)?;

    match args.command {
        Commands::Run {
            months,
            start_months,
            data_dir,
            routes_dir,
            origins,
            destinations,
            events_json,
        } => {
            executor
                .run(RunOptions {
                    months,
                    start_months,
                    data_dir,
                    routes_dir,
                    origins,
                    destinations,
                    events_json,
                })
                .await?;
        }
        Commands::Routes { routes_dir } => {
            executor.routes(routes_dir.as_deref()).await?;
        }
        Commands::Schedule {
            origin,
            destination,
            months,
        } => {
            executor.schedule(&origin, &destination, months).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool, format: LogFormat) -> anyhow::Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays clean for --events-json.
    match format {
        LogFormat::Text => subscriber
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
    }
    Ok(())
}
