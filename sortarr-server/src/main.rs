//! # sortarr
//!
//! Long-running reconciliation daemon: watches a set of source directories,
//! classifies whatever lands in them through a priority-ordered chain of
//! naming-convention recognizers, resolves canonical identity via TMDB, and
//! relocates files into a name/season/episode-addressed library tree.

mod bootstrap;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use sortarr_config::Config;
use sortarr_core::{ReconcileWorker, RetryTable, Scanner, WorkerOptions};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "sortarr")]
#[command(about = "Reconciles watched directories into a canonical media library")]
struct Cli {
    /// Path to the TOML config file; falls back to $SORTARR_CONFIG.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sortarr_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = sortarr_config::load_from_env(cli.config.as_deref())
        .context("loading configuration")?;

    let context = bootstrap::build_context(&config).context("building match context")?;
    let registry = bootstrap::build_registry(&config).context("building recognizer registry")?;
    let chain = registry.chain();
    if chain.is_empty() {
        anyhow::bail!("no enabled recognizers configured");
    }
    info!(
        recognizers = chain.len(),
        roots = config.roots.len(),
        library = %config.library.root.display(),
        "sortarr starting"
    );

    let shutdown = CancellationToken::new();
    let mut workers = Vec::with_capacity(config.roots.len());
    for root in &config.roots {
        let worker = ReconcileWorker::new(
            &root.path,
            Scanner::new(),
            RetryTable::new(config.engine.backoff_ceiling_secs),
            chain.clone(),
            context.clone(),
            WorkerOptions {
                interval: Duration::from_secs(root.interval_secs),
                attempt_delay: Duration::from_millis(config.engine.attempt_delay_ms),
                entry_delay: Duration::from_millis(config.engine.entry_delay_ms),
            },
        );
        workers.push(tokio::spawn(worker.run(shutdown.clone())));
    }

    tokio::signal::ctrl_c()
        .await
        .context("listening for shutdown signal")?;
    info!("shutdown signal received, draining workers");
    shutdown.cancel();

    for worker in workers {
        if let Err(e) = worker.await {
            error!(error = %e, "worker task failed");
        }
    }
    info!("sortarr stopped");
    Ok(())
}
