//! Process-wide transfer statistics.
//!
//! All counters are plain atomics so the hot path (upload/download
//! handlers) never takes a lock. A snapshot is consistent per field but
//! not transactional across fields, which is acceptable for stats.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::Serialize;

static COLLECTOR: OnceLock<StatsCollector> = OnceLock::new();

/// Initialize the global collector. Idempotent; returns the singleton.
pub fn init() -> &'static StatsCollector {
    COLLECTOR.get_or_init(|| {
        tracing::info!("stats collector initialized");
        StatsCollector::new()
    })
}

/// Access the global collector, initializing it on first use.
pub fn get() -> &'static StatsCollector {
    init()
}

#[derive(Debug)]
pub struct StatsCollector {
    uploads_total: AtomicI64,
    downloads_total: AtomicI64,
    bytes_uploaded: AtomicI64,
    bytes_downloaded: AtomicI64,
    upload_errors: AtomicI64,
    download_errors: AtomicI64,

    // Gauges: current in-flight transfers. Never reset.
    active_uploads: AtomicI64,
    active_downloads: AtomicI64,

    start_time: DateTime<Utc>,
}

/// Point-in-time snapshot of all counters.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub uploads_total: i64,
    pub downloads_total: i64,
    pub bytes_uploaded: i64,
    pub bytes_downloaded: i64,
    pub active_uploads: i64,
    pub active_downloads: i64,
    pub upload_errors: i64,
    pub download_errors: i64,
    pub uptime_seconds: i64,
    pub start_time: DateTime<Utc>,
}

impl StatsCollector {
    fn new() -> Self {
        StatsCollector {
            uploads_total: AtomicI64::new(0),
            downloads_total: AtomicI64::new(0),
            bytes_uploaded: AtomicI64::new(0),
            bytes_downloaded: AtomicI64::new(0),
            upload_errors: AtomicI64::new(0),
            download_errors: AtomicI64::new(0),
            active_uploads: AtomicI64::new(0),
            active_downloads: AtomicI64::new(0),
            start_time: Utc::now(),
        }
    }

    pub fn record_upload(&self, bytes: i64) {
        self.uploads_total.fetch_add(1, Ordering::Relaxed);
        self.bytes_uploaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_download(&self, bytes: i64) {
        self.downloads_total.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_upload_error(&self) {
        self.upload_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_download_error(&self) {
        self.download_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark an upload as in-flight for the lifetime of the returned guard.
    pub fn track_upload(&'static self) -> TransferGuard {
        self.active_uploads.fetch_add(1, Ordering::Relaxed);
        TransferGuard {
            gauge: &self.active_uploads,
        }
    }

    /// Mark a download as in-flight for the lifetime of the returned guard.
    pub fn track_download(&'static self) -> TransferGuard {
        self.active_downloads.fetch_add(1, Ordering::Relaxed);
        TransferGuard {
            gauge: &self.active_downloads,
        }
    }

    pub fn snapshot(&self) -> Stats {
        Stats {
            uploads_total: self.uploads_total.load(Ordering::Relaxed),
            downloads_total: self.downloads_total.load(Ordering::Relaxed),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            active_uploads: self.active_uploads.load(Ordering::Relaxed),
            active_downloads: self.active_downloads.load(Ordering::Relaxed),
            upload_errors: self.upload_errors.load(Ordering::Relaxed),
            download_errors: self.download_errors.load(Ordering::Relaxed),
            uptime_seconds: (Utc::now() - self.start_time).num_seconds(),
            start_time: self.start_time,
        }
    }

    /// Uploads plus downloads currently in flight; the shutdown drain waits
    /// on this reaching zero.
    pub fn active_transfers(&self) -> i64 {
        self.active_uploads.load(Ordering::Relaxed) + self.active_downloads.load(Ordering::Relaxed)
    }

    /// Zero the monotonic counters after a flush. Gauges keep their value:
    /// they describe current state, not an interval.
    pub fn reset(&self) {
        self.uploads_total.store(0, Ordering::Relaxed);
        self.downloads_total.store(0, Ordering::Relaxed);
        self.bytes_uploaded.store(0, Ordering::Relaxed);
        self.bytes_downloaded.store(0, Ordering::Relaxed);
        self.upload_errors.store(0, Ordering::Relaxed);
        self.download_errors.store(0, Ordering::Relaxed);
    }
}

/// Decrements its gauge on drop, so in-flight counts stay correct on every
/// exit path including panics and early `?` returns.
pub struct TransferGuard {
    gauge: &'static AtomicI64,
}

impl Drop for TransferGuard {
    fn drop(&mut self) {
        self.gauge.fetch_add(-1, Ordering::Relaxed);
    }
}
