//! Application assembly: boot ordering and wiring.
//!
//! Boot order: config → tracing (done by the caller) → metadata store →
//! upstream gateway (connect if a session exists) → auto-reconnect →
//! stats → janitor → router. `server::serve` then runs the HTTP server
//! and unwinds everything in reverse on shutdown.

pub mod routes;
pub mod server;

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use whatsbox_core::Config;
use whatsbox_wa::{MediaSession, WaGateway};

use crate::jobs::Janitor;
use crate::state::AppState;

pub struct App {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    pub janitor: Janitor,
    pub shutdown: CancellationToken,
    pub reconnect: tokio::task::JoinHandle<()>,
}

pub async fn initialize_app(
    config: Config,
    session: Arc<dyn MediaSession>,
) -> Result<App, anyhow::Error> {
    let pool = whatsbox_db::connect(&config.database_path)
        .await
        .context("failed to set up database")?;

    // The tus handler appends into this directory; make sure it exists
    // before the first CREATE.
    std::fs::create_dir_all(&config.temp_dir).context("failed to create temp directory")?;

    let wa = Arc::new(WaGateway::new(session));
    if let Err(err) = wa.connect().await {
        // Not fatal: auto-reconnect keeps trying while we serve 503s.
        tracing::error!(error = %err, "initial whatsapp connect failed");
    }

    let shutdown = CancellationToken::new();
    let reconnect = wa.clone().spawn_auto_reconnect(shutdown.clone());

    let state = Arc::new(AppState::new(config, pool, wa));
    let janitor = Janitor::start(state.clone(), &shutdown);
    let router = routes::build_router(state.clone());

    Ok(App {
        state,
        router,
        janitor,
        shutdown,
        reconnect,
    })
}
