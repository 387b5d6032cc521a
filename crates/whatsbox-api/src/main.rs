use std::sync::Arc;

use whatsbox_api::{setup, telemetry};
use whatsbox_core::Config;
use whatsbox_wa::{MediaSession, OfflineSession};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;
    let _log_guard = telemetry::init_tracing(&config)?;

    tracing::info!(host = %config.host, port = config.port, "starting whatsbox server");

    if !config.admin_enabled() {
        tracing::warn!("ADMIN_PASSWORD is not set; admin panel will be inaccessible");
    }

    // The platform client is wired in here; see whatsbox-wa for the
    // session seam.
    let session: Arc<dyn MediaSession> = Arc::new(OfflineSession::open(&config.wa_session_path)?);

    let app = setup::initialize_app(config, session).await?;
    setup::server::serve(app).await
}
