//! Domain-specific error types for the framecast pipeline.
//!
//! All fallible operations return `Result<T, FramecastError>`.
//! Only [`FramecastError::Allocation`] is fatal; everything else is
//! local to the loop that hit it and is logged, not propagated.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the frame pipeline.
#[derive(Debug, Error)]
pub enum FramecastError {
    // ── Startup Errors ───────────────────────────────────────────
    /// A slot buffer could not be reserved at startup.
    #[error("failed to allocate {bytes} bytes for slot {slot}")]
    Allocation { slot: usize, bytes: usize },

    /// A configuration value is out of range or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),

    // ── Producer Errors ──────────────────────────────────────────
    /// The display could not be grabbed.
    #[error("capture failed: {0}")]
    Capture(String),

    /// The raw image could not be compressed.
    #[error("encode failed: {0}")]
    Encode(String),

    /// The encoded frame does not fit in a slot buffer.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // ── System Errors ────────────────────────────────────────────
    /// The OS refused to spawn a worker thread.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── TransferError ────────────────────────────────────────────────

/// Why a single frame upload failed.
///
/// Every variant is transient: the frame is dropped and the consumer
/// backs off before taking the next one.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The request did not complete within the per-request timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The collector answered with a non-success status code.
    #[error("collector returned status {0}")]
    Status(u16),

    /// Connection refused, DNS failure, reset, etc.
    #[error("network error: {0}")]
    Network(String),
}
