//! The duck-typed seam to the external messaging client.

use async_trait::async_trait;
use whatsbox_core::AppError;

use crate::kind::MediaKind;

/// Opaque handle returned by the upstream on upload. All four byte-string
/// fields are required to download the blob back; we persist them verbatim
/// and never interpret them.
#[derive(Debug, Clone)]
pub struct MediaHandle {
    pub direct_path: String,
    pub media_key: Vec<u8>,
    pub file_enc_hash: Vec<u8>,
    pub file_sha256: Vec<u8>,
    pub file_length: u64,
}

/// Everything the upstream needs to locate and decrypt a blob.
/// `file_sha256` may be absent for rows created before the column existed.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub direct_path: String,
    pub media_key: Vec<u8>,
    pub file_enc_hash: Vec<u8>,
    pub file_sha256: Option<Vec<u8>>,
    pub file_length: u64,
    pub mime_type: String,
}

/// A pairing code event from the upstream, valid for `timeout_secs`.
#[derive(Debug, Clone)]
pub struct PairCode {
    pub code: String,
    pub timeout_secs: u64,
}

/// Narrow interface over the external messaging client library.
///
/// Implementations own the session store (a separate local database file,
/// opaque to us) and the wire protocol. Only one pairing may be in flight
/// at a time; `wait_for_pair` resolves with the next code the upstream
/// emits.
#[async_trait]
pub trait MediaSession: Send + Sync {
    async fn connect(&self) -> Result<(), AppError>;

    fn disconnect(&self);

    async fn logout(&self) -> Result<(), AppError>;

    /// Whether a stored device session exists (independent of the socket).
    fn is_logged_in(&self) -> bool;

    /// Whether the transport is currently up.
    fn is_connected(&self) -> bool;

    async fn upload(&self, data: &[u8], kind: MediaKind) -> Result<MediaHandle, AppError>;

    async fn download(&self, req: &DownloadRequest, kind: MediaKind) -> Result<Vec<u8>, AppError>;

    /// Block until the upstream emits a pairing code.
    async fn wait_for_pair(&self) -> Result<PairCode, AppError>;

    /// Close the session store.
    async fn close(&self) -> Result<(), AppError>;
}
