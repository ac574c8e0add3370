//! Pipeline counters shared by both loops.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters. The producer only touches the capture-side
/// fields and the consumer only the upload-side ones.
#[derive(Debug, Default)]
pub struct PipelineStats {
    frames_published: AtomicU64,
    capture_skips: AtomicU64,
    encode_skips: AtomicU64,
    oversize_skips: AtomicU64,
    frames_uploaded: AtomicU64,
    upload_failures: AtomicU64,
    bytes_uploaded: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn published(&self) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn capture_skipped(&self) {
        self.capture_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn encode_skipped(&self) {
        self.encode_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn oversize_skipped(&self) {
        self.oversize_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn uploaded(&self, bytes: usize) {
        self.frames_uploaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_uploaded.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn upload_failed(&self) {
        self.upload_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> StreamReport {
        StreamReport {
            frames_published: self.frames_published.load(Ordering::Relaxed),
            capture_skips: self.capture_skips.load(Ordering::Relaxed),
            encode_skips: self.encode_skips.load(Ordering::Relaxed),
            oversize_skips: self.oversize_skips.load(Ordering::Relaxed),
            frames_uploaded: self.frames_uploaded.load(Ordering::Relaxed),
            upload_failures: self.upload_failures.load(Ordering::Relaxed),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::Relaxed),
        }
    }
}

// ── StreamReport ─────────────────────────────────────────────────

/// Counters at a point in time; returned when the stream shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamReport {
    /// Frames handed to the slot store.
    pub frames_published: u64,
    /// Iterations where the display grab produced nothing.
    pub capture_skips: u64,
    /// Iterations where encoding failed.
    pub encode_skips: u64,
    /// Encoded frames that did not fit in a slot.
    pub oversize_skips: u64,
    /// Frames the collector accepted.
    pub frames_uploaded: u64,
    /// Frames dropped after a failed upload.
    pub upload_failures: u64,
    /// Payload bytes the collector accepted.
    pub bytes_uploaded: u64,
}

impl fmt::Display for StreamReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "published {} (skipped: capture {}, encode {}, oversize {}), uploaded {} ({} bytes), failed {}",
            self.frames_published,
            self.capture_skips,
            self.encode_skips,
            self.oversize_skips,
            self.frames_uploaded,
            self.bytes_uploaded,
            self.upload_failures,
        )
    }
}
