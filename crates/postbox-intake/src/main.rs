use anyhow::Context;
use tracing::{info, warn};

use postbox_intake::{ASSETS, AppStateInner, IntakeConfig, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postbox_intake=debug,tower_http=debug".into()),
        )
        .init();

    let config = IntakeConfig::from_env()?;

    if !config.static_dir.is_dir() {
        warn!(
            "Static directory {} not found; asset requests will 404",
            config.static_dir.display()
        );
    } else {
        for name in ASSETS.iter().chain(["error.html"].iter()) {
            if !config.static_dir.join(name).is_file() {
                warn!("Static file {} missing from {}", name, config.static_dir.display());
            }
        }
    }

    let state = AppStateInner::from_config(&config);
    let app = router(state, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("bind HTTP listener on {}", config.http_addr))?;
    info!("Postbox intake listening on {}", config.http_addr);
    info!("Relaying submissions to {}", config.relay_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

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
