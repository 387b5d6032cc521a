//! Gateway over the upstream messaging session.

use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use whatsbox_core::AppError;

use crate::kind::MediaKind;
use crate::qr::render_png_base64;
use crate::session::{DownloadRequest, MediaHandle, MediaSession};

const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);
const RECONNECT_BACKOFF: Duration = Duration::from_secs(30);
const QR_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct WaStatus {
    pub connected: bool,
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    pub reconnect_count: i64,
}

/// A pairing QR code ready for the browser.
#[derive(Debug, Clone, Serialize)]
pub struct QrCode {
    pub code: String,
    /// Base64-encoded PNG.
    pub image: String,
    /// Seconds until the upstream invalidates this code.
    pub timeout: u64,
}

struct CachedQr {
    qr: QrCode,
    expires_at: Instant,
}

#[derive(Default)]
struct ConnState {
    connected: bool,
    connected_at: Option<DateTime<Utc>>,
    reconnect_count: i64,
}

pub struct WaGateway {
    session: Arc<dyn MediaSession>,
    state: RwLock<ConnState>,
    cached_qr: Mutex<Option<CachedQr>>,
    /// Serializes pairing attempts; concurrent callers share one QR.
    qr_flight: tokio::sync::Mutex<()>,
    /// Cancels the previous pairing when a new one starts.
    pair_cancel: Mutex<Option<CancellationToken>>,
}

impl WaGateway {
    pub fn new(session: Arc<dyn MediaSession>) -> Self {
        WaGateway {
            session,
            state: RwLock::new(ConnState::default()),
            cached_qr: Mutex::new(None),
            qr_flight: tokio::sync::Mutex::new(()),
            pair_cancel: Mutex::new(None),
        }
    }

    /// Connect if a stored session exists. Without one this is a no-op;
    /// pairing via QR has to happen first.
    pub async fn connect(&self) -> Result<(), AppError> {
        if !self.session.is_logged_in() {
            tracing::info!("not logged in, QR pairing required");
            return Ok(());
        }

        self.session.connect().await?;

        let mut state = self.state.write().expect("state lock poisoned");
        state.connected = true;
        state.connected_at = Some(Utc::now());
        drop(state);

        // A fresh login invalidates any pairing code still cached.
        *self.cached_qr.lock().expect("qr cache lock poisoned") = None;

        tracing::info!("whatsapp connected");
        Ok(())
    }

    pub fn disconnect(&self) {
        self.session.disconnect();
        self.state.write().expect("state lock poisoned").connected = false;
        tracing::info!("whatsapp disconnected");
    }

    pub async fn logout(&self) -> Result<(), AppError> {
        if !self.session.is_logged_in() {
            return Err(AppError::conflict("not_logged_in", "WhatsApp is not logged in"));
        }
        self.session.logout().await?;
        self.state.write().expect("state lock poisoned").connected = false;
        tracing::info!("logged out from whatsapp");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.state.read().expect("state lock poisoned").connected && self.session.is_connected()
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_logged_in()
    }

    pub fn status(&self) -> WaStatus {
        let state = self.state.read().expect("state lock poisoned");
        WaStatus {
            connected: state.connected && self.session.is_connected(),
            logged_in: self.session.is_logged_in(),
            connected_at: state.connected_at,
            reconnect_count: state.reconnect_count,
        }
    }

    /// Upload plaintext bytes; the upstream encrypts and stores them and
    /// returns the opaque handle. Media kind derives from the MIME type
    /// here, not in handlers.
    pub async fn upload(&self, data: &[u8], mime_type: &str) -> Result<MediaHandle, AppError> {
        if !self.is_connected() {
            return Err(AppError::NotConnected);
        }
        let kind = MediaKind::from_mime(mime_type);
        tracing::debug!(size = data.len(), kind = kind.as_str(), "uploading to whatsapp");
        let handle = self.session.upload(data, kind).await?;
        tracing::info!(
            direct_path = %handle.direct_path,
            file_length = handle.file_length,
            "uploaded to whatsapp"
        );
        Ok(handle)
    }

    pub async fn download(&self, req: &DownloadRequest) -> Result<Vec<u8>, AppError> {
        if !self.is_connected() {
            return Err(AppError::NotConnected);
        }
        let kind = MediaKind::from_mime(&req.mime_type);
        tracing::debug!(
            direct_path = %req.direct_path,
            kind = kind.as_str(),
            file_length = req.file_length,
            "downloading from whatsapp"
        );
        let data = self.session.download(req, kind).await?;
        tracing::info!(direct_path = %req.direct_path, size = data.len(), "downloaded from whatsapp");
        Ok(data)
    }

    /// Fetch a pairing QR code.
    ///
    /// Contracts: at most one pairing is open (a new request cancels the
    /// previous); a generated code is cached until its upstream timeout so
    /// concurrent pollers share it; the pairing task is spawned detached so
    /// it outlives the HTTP request that started it.
    pub async fn qr(self: &Arc<Self>) -> Result<QrCode, AppError> {
        if self.session.is_logged_in() {
            return Err(AppError::conflict(
                "already_logged_in",
                "WhatsApp is already logged in",
            ));
        }

        let _flight = self.qr_flight.lock().await;

        if let Some(cached) = self.cached_qr.lock().expect("qr cache lock poisoned").as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.qr.clone());
            }
        }

        let token = CancellationToken::new();
        if let Some(previous) = self
            .pair_cancel
            .lock()
            .expect("pair cancel lock poisoned")
            .replace(token.clone())
        {
            previous.cancel();
        }

        let gateway = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let pair = tokio::select! {
                _ = token.cancelled() => {
                    return Err(AppError::internal("pairing superseded by a newer request"));
                }
                pair = gateway.session.wait_for_pair() => pair?,
            };

            let qr = QrCode {
                image: render_png_base64(&pair.code)?,
                timeout: pair.timeout_secs,
                code: pair.code,
            };

            *gateway.cached_qr.lock().expect("qr cache lock poisoned") = Some(CachedQr {
                qr: qr.clone(),
                expires_at: Instant::now() + Duration::from_secs(pair.timeout_secs),
            });
            Ok(qr)
        });

        match tokio::time::timeout(QR_TIMEOUT, handle).await {
            Ok(joined) => {
                joined.map_err(|err| AppError::internal(format!("pairing task failed: {err}")))?
            }
            Err(_) => Err(AppError::upstream(
                "qr_generation_failed",
                "timed out waiting for QR code",
            )),
        }
    }

    /// Supervised reconnect loop: while logged in but disconnected, try to
    /// connect every 5 s, backing off to 30 s after a failure. Exits when
    /// the shutdown token fires.
    pub fn spawn_auto_reconnect(
        self: Arc<Self>,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if self.session.is_logged_in() && !self.is_connected() {
                    {
                        let mut state = self.state.write().expect("state lock poisoned");
                        state.reconnect_count += 1;
                    }
                    tracing::info!("attempting to reconnect to whatsapp");

                    if let Err(err) = self.connect().await {
                        tracing::error!(error = %err, "reconnection failed");
                        if sleep_or_shutdown(RECONNECT_BACKOFF, &shutdown).await {
                            return;
                        }
                        continue;
                    }
                }
                if sleep_or_shutdown(RECONNECT_INTERVAL, &shutdown).await {
                    return;
                }
            }
        })
    }

    /// Disconnect and close the session store.
    pub async fn close(&self) -> Result<(), AppError> {
        self.disconnect();
        self.session.close().await
    }

    pub fn reconnect_count(&self) -> i64 {
        self.state.read().expect("state lock poisoned").reconnect_count
    }
}

/// Sleep the given duration; returns true when the token fired instead.
async fn sleep_or_shutdown(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::PairCode;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Scripted fake session for gateway behavior tests.
    struct FakeSession {
        logged_in: AtomicBool,
        transport_up: AtomicBool,
        pair_calls: AtomicUsize,
        connect_calls: AtomicUsize,
        fail_connect: AtomicBool,
    }

    impl FakeSession {
        fn new() -> Self {
            FakeSession {
                logged_in: AtomicBool::new(false),
                transport_up: AtomicBool::new(false),
                pair_calls: AtomicUsize::new(0),
                connect_calls: AtomicUsize::new(0),
                fail_connect: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl MediaSession for FakeSession {
        async fn connect(&self) -> Result<(), AppError> {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_connect.load(Ordering::SeqCst) {
                return Err(AppError::upstream("upload_failed", "no route"));
            }
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
            Ok(MediaHandle {
                direct_path: "/v/t62.7119-24/fake".into(),
                media_key: vec![7; 32],
                file_enc_hash: vec![8; 32],
                file_sha256: vec![9; 32],
                file_length: data.len() as u64,
            })
        }

        async fn download(
            &self,
            _req: &DownloadRequest,
            _kind: MediaKind,
        ) -> Result<Vec<u8>, AppError> {
            Ok(vec![1, 2, 3])
        }

        async fn wait_for_pair(&self) -> Result<PairCode, AppError> {
            let n = self.pair_calls.fetch_add(1, Ordering::SeqCst);
            Ok(PairCode {
                code: format!("pair-code-{n}"),
                timeout_secs: 60,
            })
        }

        async fn close(&self) -> Result<(), AppError> {
            Ok(())
        }
    }

    fn gateway_with(session: FakeSession) -> (Arc<WaGateway>, Arc<FakeSession>) {
        let session = Arc::new(session);
        let dyn_session: Arc<dyn MediaSession> = session.clone();
        (Arc::new(WaGateway::new(dyn_session)), session)
    }

    #[tokio::test]
    async fn upload_requires_connection() {
        let (gateway, session) = gateway_with(FakeSession::new());
        let err = gateway.upload(b"data", "text/plain").await.unwrap_err();
        assert!(matches!(err, AppError::NotConnected));

        session.logged_in.store(true, Ordering::SeqCst);
        gateway.connect().await.unwrap();
        assert!(gateway.is_connected());
        let handle = gateway.upload(b"data", "text/plain").await.unwrap();
        assert_eq!(handle.file_length, 4);
    }

    #[tokio::test]
    async fn connect_is_noop_when_not_paired() {
        let (gateway, session) = gateway_with(FakeSession::new());
        gateway.connect().await.unwrap();
        assert_eq!(session.connect_calls.load(Ordering::SeqCst), 0);
        assert!(!gateway.is_connected());
    }

    #[tokio::test]
    async fn qr_is_cached_until_timeout() {
        let (gateway, session) = gateway_with(FakeSession::new());

        let first = gateway.qr().await.unwrap();
        let second = gateway.qr().await.unwrap();
        assert_eq!(first.code, second.code);
        assert_eq!(session.pair_calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.timeout, 60);
        assert!(!first.image.is_empty());
    }

    #[tokio::test]
    async fn concurrent_qr_callers_share_one_pairing() {
        let (gateway, session) = gateway_with(FakeSession::new());

        let (a, b) = futures::future::join(gateway.qr(), gateway.qr()).await;
        assert_eq!(a.unwrap().code, b.unwrap().code);
        assert_eq!(session.pair_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn qr_refuses_when_logged_in() {
        let (gateway, session) = gateway_with(FakeSession::new());
        session.logged_in.store(true, Ordering::SeqCst);
        let err = gateway.qr().await.unwrap_err();
        assert_eq!(err.error_code(), "already_logged_in");
    }

    #[tokio::test]
    async fn logout_requires_login() {
        let (gateway, _session) = gateway_with(FakeSession::new());
        let err = gateway.logout().await.unwrap_err();
        assert_eq!(err.error_code(), "not_logged_in");
    }

    #[tokio::test(start_paused = true)]
    async fn auto_reconnect_counts_attempts_and_stops() {
        let (gateway, session) = gateway_with(FakeSession::new());
        session.logged_in.store(true, Ordering::SeqCst);
        session.fail_connect.store(true, Ordering::SeqCst);

        let shutdown = CancellationToken::new();
        let handle = Arc::clone(&gateway).spawn_auto_reconnect(shutdown.clone());

        // Paused time: advancing the clock drives the 30s backoff sleeps.
        tokio::time::sleep(Duration::from_secs(95)).await;
        assert!(gateway.reconnect_count() >= 3);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
