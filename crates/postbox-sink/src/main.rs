use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use postbox_db::Database;
use postbox_sink::{RelaySink, SinkConfig, bind_listener};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postbox_sink=debug,postbox_db=info".into()),
        )
        .init();

    let config = SinkConfig::from_env()?;

    // Opened once, shared by every worker
    let db = Database::open(&config.db_path)?;
    let sink = RelaySink::new(Arc::new(db), &config);

    let listener = bind_listener(config.listen_addr, config.backlog)
        .with_context(|| format!("bind relay listener on {}", config.listen_addr))?;
    info!(
        "Postbox sink listening on {} (backlog {}, {} workers, max frame {} bytes)",
        config.listen_addr, config.backlog, config.max_workers, config.max_frame_size
    );

    sink.run_until_shutdown(listener, shutdown_signal()).await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable ({}), waiting for Ctrl+C only", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
