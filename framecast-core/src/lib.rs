//! # framecast-core
//!
//! Screen-to-collector streaming pipeline.
//!
//! This crate contains:
//! - **Pipeline**: a fixed-depth ring of frame buffers shared by one
//!   capture producer and one upload consumer, with blocking handoff,
//!   backpressure and cooperative shutdown
//! - **Capabilities**: `ScreenGrabber` (xcap), `FrameEncoder` (JPEG),
//!   `FrameSink` (HTTP POST)
//! - **Service**: `StreamService`, which starts, stops and joins the
//!   two worker threads
//! - **Error**: `FramecastError`, a typed `thiserror`-based error hierarchy

pub mod error;
pub mod pipeline;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use error::{FramecastError, TransferError};
pub use pipeline::{
    FrameEncoder, FrameSink, HttpUploader, JpegFrameEncoder, Pipeline, PixelFormat,
    RawScreenFrame, ScreenGrabber, StopHandle, StreamConfig, StreamReport, StreamService,
    XcapGrabber,
};
