//! # framecast pipeline
//!
//! Continuous capture of one display, JPEG compression, and HTTP upload
//! to a collector, decoupled by a fixed-depth ring of reusable buffers.
//!
//! ## Architecture
//!
//! ```text
//!  "framecast-capture" thread                 "framecast-upload" thread
//! ┌──────────────────────────┐               ┌──────────────────────────┐
//! │ ScreenGrabber::grab      │               │ acquire_consumer_slot    │
//! │   ↓                      │   Pipeline    │   ↓                      │
//! │ FrameEncoder::encode     │  ┌─────────┐  │ FrameSink::send_frame    │
//! │   ↓                      │  │ slot 0  │  │   ↓                      │
//! │ acquire_producer_slot ───┼─►│ slot 1  ├──┼─► release                │
//! │   ↓ publish              │  │ slot 2  │  │   ↓ (backoff on failure) │
//! │ pace to 1/fps            │  └─────────┘  │                          │
//! └──────────────────────────┘               └──────────────────────────┘
//!                 ▲                                        ▲
//!                 └────── StreamService (start/stop/join) ─┘
//! ```
//!
//! ## Sub-modules
//!
//! | Module        | Purpose                                             |
//! |---------------|-----------------------------------------------------|
//! | `types`       | Raw frame / pixel types                             |
//! | `slot`        | Fixed-depth store of reusable buffers               |
//! | `coordinator` | Lock + condvar protocol, slot handles, shutdown     |
//! | `capture`     | `ScreenGrabber` seam and the `xcap` implementation  |
//! | `encoder`     | `FrameEncoder` seam and the JPEG implementation     |
//! | `transport`   | `FrameSink` seam and the HTTP uploader              |
//! | `producer`    | Capture loop with frame pacing                      |
//! | `consumer`    | Upload loop with fixed retry backoff, throughput    |
//! | `stats`       | Shared counters and the final report                |
//! | `service`     | Lifecycle controller                                |

pub mod capture;
pub mod consumer;
pub mod coordinator;
pub mod encoder;
pub mod producer;
pub mod service;
pub mod slot;
pub mod stats;
pub mod transport;
pub mod types;

// ── Re-exports ───────────────────────────────────────────────────

pub use capture::{ScreenGrabber, XcapGrabber};
pub use consumer::{UploadLoop, UploadOutcome};
pub use coordinator::{Pipeline, ReadSlot, WriteSlot};
pub use encoder::{FrameEncoder, JpegFrameEncoder};
pub use producer::{CaptureLoop, CaptureOutcome};
pub use service::{StopHandle, StreamConfig, StreamService};
pub use slot::{SlotState, SlotStore};
pub use stats::{PipelineStats, StreamReport};
pub use transport::{FRAME_CONTENT_TYPE, FrameSink, HttpUploader};
pub use types::{PixelFormat, RawScreenFrame};
