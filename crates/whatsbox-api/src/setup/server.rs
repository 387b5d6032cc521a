//! Server startup and graceful shutdown.

use std::time::{Duration, Instant};

use anyhow::Result;

use super::App;

/// Bind, serve, and unwind on SIGINT/SIGTERM.
pub async fn serve(app: App) -> Result<()> {
    let config = &app.state.config;
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %addr,
        max_upload_mb = config.max_upload_size / 1024 / 1024,
        default_expiry_days = config.default_expiry_days,
        "server ready and accepting connections"
    );

    axum::serve(listener, app.router.clone())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown(app).await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c"),
        _ = terminate => tracing::info!("received terminate signal"),
    }
    tracing::info!("shutting down gracefully");
}

/// Unwind in reverse boot order: drain transfers (bounded by
/// SHUTDOWN_TIMEOUT), stop the janitor (terminal stats flush inside),
/// stop auto-reconnect, close the upstream session, close the pool.
async fn shutdown(app: App) {
    let deadline = Instant::now() + app.state.config.shutdown_timeout;
    loop {
        let active = app.state.collector.active_transfers();
        if active == 0 {
            break;
        }
        if Instant::now() >= deadline {
            tracing::warn!(active_transfers = active, "shutdown timeout reached with active transfers");
            break;
        }
        tracing::info!(active_transfers = active, "waiting for active transfers to complete");
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    app.shutdown.cancel();
    app.janitor.stop().await;
    if let Err(err) = app.reconnect.await {
        tracing::error!(error = %err, "auto-reconnect task failed to join");
    }
    if let Err(err) = app.state.wa.close().await {
        tracing::error!(error = %err, "failed to close whatsapp session");
    }
    app.state.pool.close().await;

    tracing::info!("server stopped");
}
