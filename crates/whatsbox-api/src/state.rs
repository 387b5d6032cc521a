//! Shared application state.

use std::sync::Arc;

use sqlx::SqlitePool;
use whatsbox_core::stats::StatsCollector;
use whatsbox_core::Config;
use whatsbox_db::{AccessLogRepository, FileRepository, StatsRepository, UploadRepository};
use whatsbox_wa::WaGateway;

/// Everything handlers and background jobs need, injected by the
/// lifecycle supervisor. Cloning is cheap: repositories hold the pool.
pub struct AppState {
    pub config: Config,
    pub pool: SqlitePool,
    pub files: FileRepository,
    pub uploads: UploadRepository,
    pub access_log: AccessLogRepository,
    pub stats: StatsRepository,
    pub wa: Arc<WaGateway>,
    pub collector: &'static StatsCollector,
}

impl AppState {
    pub fn new(config: Config, pool: SqlitePool, wa: Arc<WaGateway>) -> Self {
        AppState {
            files: FileRepository::new(pool.clone()),
            uploads: UploadRepository::new(pool.clone()),
            access_log: AccessLogRepository::new(pool.clone()),
            stats: StatsRepository::new(pool.clone()),
            collector: whatsbox_core::stats::init(),
            config,
            pool,
            wa,
        }
    }
}
