//! Test helpers: full router + state against a fake upstream session and
//! an in-memory SQLite database. No external services needed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;
use whatsbox_api::setup::routes::build_router;
use whatsbox_api::state::AppState;
use whatsbox_core::{AppError, Config};
use whatsbox_wa::{DownloadRequest, MediaHandle, MediaKind, MediaSession, PairCode, WaGateway};

/// Scripted in-memory stand-in for the upstream messaging client.
pub struct FakeSession {
    logged_in: AtomicBool,
    transport_up: AtomicBool,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    counter: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
    fail_uploads: AtomicBool,
    fail_downloads: AtomicBool,
}

impl FakeSession {
    pub fn new() -> Self {
        FakeSession {
            logged_in: AtomicBool::new(true),
            transport_up: AtomicBool::new(false),
            blobs: Mutex::new(HashMap::new()),
            counter: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            fail_uploads: AtomicBool::new(false),
            fail_downloads: AtomicBool::new(false),
        }
    }

    pub fn set_logged_in(&self, value: bool) {
        self.logged_in.store(value, Ordering::SeqCst);
    }

    pub fn set_transport_up(&self, value: bool) {
        self.transport_up.store(value, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self, value: bool) {
        self.fail_uploads.store(value, Ordering::SeqCst);
    }

    pub fn fail_downloads(&self, value: bool) {
        self.fail_downloads.store(value, Ordering::SeqCst);
    }

    pub fn upload_count(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSession for FakeSession {
    async fn connect(&self) -> Result<(), AppError> {
        self.transport_up.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) {
        self.transport_up.store(false, Ordering::SeqCst);
    }

    async fn logout(&self) -> Result<(), AppError> {
        self.logged_in.store(false, Ordering::SeqCst);
        self.transport_up.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    fn is_connected(&self) -> bool {
        self.transport_up.load(Ordering::SeqCst)
    }

    async fn upload(&self, data: &[u8], _kind: MediaKind) -> Result<MediaHandle, AppError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(AppError::upstream("upload_failed", "scripted upload failure"));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let direct_path = format!("/v/t62.7119-24/blob-{n}");
        self.blobs
            .lock()
            .unwrap()
            .insert(direct_path.clone(), data.to_vec());
        Ok(MediaHandle {
            direct_path,
            media_key: vec![0xAA; 32],
            file_enc_hash: vec![0xBB; 32],
            file_sha256: whatsbox_core::sha256_bytes(data),
            file_length: data.len() as u64,
        })
    }

    async fn download(
        &self,
        req: &DownloadRequest,
        _kind: MediaKind,
    ) -> Result<Vec<u8>, AppError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(AppError::upstream(
                "download_failed",
                "scripted download failure",
            ));
        }
        self.blobs
            .lock()
            .unwrap()
            .get(&req.direct_path)
            .cloned()
            .ok_or_else(|| AppError::upstream("download_failed", "unknown direct path"))
    }

    async fn wait_for_pair(&self) -> Result<PairCode, AppError> {
        Ok(PairCode {
            code: "2@fake-pairing-code".into(),
            timeout_secs: 60,
        })
    }

    async fn close(&self) -> Result<(), AppError> {
        Ok(())
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub session: Arc<FakeSession>,
    pub _temp_dir: TempDir,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(customize: impl FnOnce(&mut Config)) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut config = Config {
        host: "127.0.0.1".into(),
        port: 0,
        database_path: ":memory:".into(),
        wa_session_path: temp_dir
            .path()
            .join("wa_session.db")
            .to_string_lossy()
            .into_owned(),
        temp_dir: temp_dir.path().join("tmp").to_string_lossy().into_owned(),
        max_upload_size: 10 * 1024 * 1024,
        default_expiry_days: 30,
        max_expiry_days: 30,
        short_id_length: 6,
        log_level: "debug".into(),
        log_format: "pretty".into(),
        log_output: "stdout".into(),
        log_file_path: temp_dir
            .path()
            .join("whatsbox.log")
            .to_string_lossy()
            .into_owned(),
        shutdown_timeout: Duration::from_secs(5),
        admin_password: String::new(),
        admin_session_secret: "test-session-secret".into(),
        admin_session_max_age: 3600,
    };
    customize(&mut config);

    std::fs::create_dir_all(&config.temp_dir).expect("temp dir");

    // One connection: each `sqlite::memory:` connection is its own
    // database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    whatsbox_db::run_migrations(&pool).await.expect("migrations");

    let session = Arc::new(FakeSession::new());
    let dyn_session: Arc<dyn MediaSession> = session.clone();
    let wa = Arc::new(WaGateway::new(dyn_session));
    wa.connect().await.expect("fake connect");

    let state = Arc::new(AppState::new(config, pool, wa));
    let server = TestServer::new(build_router(state.clone())).expect("test server");

    TestApp {
        server,
        state,
        session,
        _temp_dir: temp_dir,
    }
}

impl TestApp {
    /// Log in as admin and return the session cookie value
    /// (`name=token`), ready for a `Cookie` header.
    pub async fn admin_cookie(&self) -> String {
        let response = self
            .server
            .post("/api/admin/login")
            .json(&serde_json::json!({"password": self.state.config.admin_password}))
            .await;
        assert_eq!(response.status_code(), 200, "admin login failed");
        let set_cookie = response
            .headers()
            .get("set-cookie")
            .expect("login sets a cookie")
            .to_str()
            .unwrap();
        set_cookie
            .split(';')
            .next()
            .expect("cookie pair")
            .to_string()
    }

    /// Wait for a detached completion task to promote an upload whose
    /// plaintext hash is `file_hash` into a file record.
    pub async fn wait_for_completed_file(&self, file_hash: &str) -> whatsbox_db::FileRecord {
        // Generous budget: completion may bcrypt-hash a password, which
        // is deliberately slow.
        for _ in 0..500 {
            if let Some(file) = self
                .state
                .files
                .get_by_hash(file_hash)
                .await
                .expect("hash lookup")
            {
                return file;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("completion did not produce a file for hash {file_hash}");
    }
}
