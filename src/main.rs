use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chan_archiver::archive::{archive_all, collect_threads};
use chan_archiver::config::{Args, Verbosity};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(args.verbosity())?;

    let config = args.into_config().context("Invalid configuration")?;

    if !config.has_inputs() {
        Args::command()
            .print_help()
            .context("Failed to print help")?;
        return Ok(());
    }

    let mut threads = collect_threads(&config)
        .await
        .context("Failed to read thread list")?;
    info!(threads = threads.len(), dir = %config.download_dir.display(), "Starting archive run");

    archive_all(&config, &mut threads)
        .await
        .context("Archiving failed")?;

    Ok(())
}

fn init_tracing(verbosity: Verbosity) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.filter()));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
