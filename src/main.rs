use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use remote_sync_guard::config::GuardConfig;
use remote_sync_guard::metrics;
use remote_sync_guard::replay::{self, Recording};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Remote Sync Guard v{}", env!("CARGO_PKG_VERSION"));

    let path = std::env::args()
        .nth(1)
        .context("usage: remote-sync-guard <recording.json>")?;

    // Load configuration
    let config = GuardConfig::load_or_default();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;
    info!(
        "Configuration loaded: threshold={}, cheat_time={}s, tick_rate={}Hz",
        config.movement.threshold, config.movement.cheat_time, config.tick_rate
    );

    let recording = Recording::load(&path).with_context(|| format!("loading {}", path))?;
    info!(
        "Replaying {} ({} entities, {} events)",
        path,
        recording.entities.len(),
        recording.events.len()
    );

    let report = replay::run(&recording, &config)?;

    for signal in &report.signals {
        warn!("{}", signal);
    }
    for (entity, position) in &report.final_positions {
        info!(%entity, x = position.x, y = position.y, z = position.z, "Final rendered position");
    }
    info!(
        "Replay complete: {} signals ({} movement, {} ability), {} snapshots applied, {} dropped",
        report.signals.len(),
        report.movement_signals(),
        report.ability_signals(),
        report.snapshots_applied,
        report.snapshots_dropped
    );
    if report.signals_dropped > 0 {
        warn!("{} signals dropped on a full signal bus", report.signals_dropped);
    }

    // Keep serving the final counters when a metrics port is configured
    if let Some(port) = config.metrics_port {
        let metrics = Arc::clone(&report.metrics);
        let server = tokio::spawn(async move {
            if let Err(e) = metrics::start_metrics_server(metrics, port).await {
                error!("Metrics server error: {}", e);
            }
        });

        tokio::signal::ctrl_c().await.context("installing Ctrl+C handler")?;
        info!("Shutdown signal received");
        server.abort();
    }

    Ok(())
}
