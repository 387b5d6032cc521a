//! Upstream media gateway.
//!
//! The external messaging client is consumed through the narrow
//! [`MediaSession`] trait; everything the rest of the server needs
//! (connection state, reconnects, QR pairing, media-kind classification)
//! lives in [`WaGateway`] so the system stays testable with a fake
//! session.

mod gateway;
mod kind;
mod offline;
mod qr;
mod session;

pub use gateway::{QrCode, WaGateway, WaStatus};
pub use kind::MediaKind;
pub use offline::OfflineSession;
pub use session::{DownloadRequest, MediaHandle, MediaSession, PairCode};
