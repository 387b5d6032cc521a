//! Stand-in session used when no platform client is linked.
//!
//! The concrete messaging client is an external collaborator wired in at
//! integration time; this implementation keeps the binary bootable without
//! it. The server comes up, `/ready` reports 503, and every transfer
//! surfaces `whatsapp_not_connected` until a real session replaces this.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use whatsbox_core::AppError;

use crate::kind::MediaKind;
use crate::session::{DownloadRequest, MediaHandle, MediaSession, PairCode};

pub struct OfflineSession {
    #[allow(dead_code)]
    session_path: PathBuf,
}

impl OfflineSession {
    /// Prepare the session store location so a real client can take it
    /// over without further setup.
    pub fn open(session_path: &str) -> Result<Self, AppError> {
        if let Some(parent) = Path::new(session_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        tracing::warn!(
            path = %session_path,
            "no upstream client linked; transfers will report whatsapp_not_connected"
        );
        Ok(OfflineSession {
            session_path: PathBuf::from(session_path),
        })
    }
}

#[async_trait]
impl MediaSession for OfflineSession {
    async fn connect(&self) -> Result<(), AppError> {
        Err(AppError::NotConnected)
    }

    fn disconnect(&self) {}

    async fn logout(&self) -> Result<(), AppError> {
        Err(AppError::conflict("not_logged_in", "no session to log out of"))
    }

    fn is_logged_in(&self) -> bool {
        false
    }

    fn is_connected(&self) -> bool {
        false
    }

    async fn upload(&self, _data: &[u8], _kind: MediaKind) -> Result<MediaHandle, AppError> {
        Err(AppError::NotConnected)
    }

    async fn download(
        &self,
        _req: &DownloadRequest,
        _kind: MediaKind,
    ) -> Result<Vec<u8>, AppError> {
        Err(AppError::NotConnected)
    }

    async fn wait_for_pair(&self) -> Result<PairCode, AppError> {
        Err(AppError::upstream(
            "qr_generation_failed",
            "no upstream client available for pairing",
        ))
    }

    async fn close(&self) -> Result<(), AppError> {
        Ok(())
    }
}
