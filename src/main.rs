//! Reconciler daemon.
//!
//! Loads settings, wires the pipeline against the configured engine
//! commands, runs a full reconciliation pass at startup and re-runs it on
//! SIGHUP. Lifecycle operations arrive through the library API; the
//! administrative surface lives elsewhere.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stream_director::access::{Actor, AllowAll};
use stream_director::audit::TracingAuditLog;
use stream_director::certs::NullCertificateService;
use stream_director::config::{load_settings, DirectorSettings};
use stream_director::engine::process::ProcessEngine;
use stream_director::entity::OwnerId;
use stream_director::manager::EntityManager;
use stream_director::reconcile::Reconciler;
use stream_director::store::memory::MemoryStore;

#[derive(Parser)]
#[command(name = "stream-director")]
#[command(about = "Config reconciliation daemon for a proxy engine", long_about = None)]
struct Cli {
    /// Path to the settings file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => load_settings(path)?,
        None => DirectorSettings::default(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("stream_director={}", settings.observability.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("stream-director v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        live_dir = %settings.live_dir.path.display(),
        check_command = %settings.engine.check_command,
        reload_attempts = settings.reload.max_attempts,
        "Settings loaded"
    );

    let engine = Arc::new(ProcessEngine::new(settings.engine.clone()));
    let reconciler = Arc::new(Reconciler::from_settings(&settings, engine));
    let manager = EntityManager::new(
        Arc::new(MemoryStore::new()),
        Arc::new(NullCertificateService),
        Arc::new(TracingAuditLog),
        Arc::new(AllowAll),
        reconciler,
    );

    let system = Actor {
        user_id: OwnerId(0),
    };

    // Startup pass corrects any transients left by a previous crash
    match manager.reconcile_all(&system).await {
        Ok(count) => tracing::info!(artifacts = count, "startup reconciliation complete"),
        Err(e) => tracing::error!(error = %e, "startup reconciliation failed"),
    }

    let mut hangup = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                break;
            }
            _ = hangup.recv() => {
                tracing::info!("SIGHUP received, re-running reconciliation");
                match manager.reconcile_all(&system).await {
                    Ok(count) => tracing::info!(artifacts = count, "reconciliation complete"),
                    Err(e) => tracing::error!(error = %e, "reconciliation failed"),
                }
            }
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
