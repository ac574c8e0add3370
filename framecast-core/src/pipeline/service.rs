//! Stream lifecycle: allocate, start both loops, stop, join.
//!
//! ```text
//! StreamService::start ──► slot store allocated
//!                      ──► "framecast-capture" thread: CaptureLoop::run
//!                      ──► "framecast-upload"  thread: UploadLoop::run
//!  … external stop trigger …
//! StopHandle::stop / StreamService::shutdown
//!                      ──► running = false, notify_all
//!                      ──► join both threads ──► StreamReport
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info};

use crate::error::FramecastError;
use crate::pipeline::capture::ScreenGrabber;
use crate::pipeline::consumer::UploadLoop;
use crate::pipeline::coordinator::Pipeline;
use crate::pipeline::encoder::FrameEncoder;
use crate::pipeline::producer::CaptureLoop;
use crate::pipeline::stats::{PipelineStats, StreamReport};
use crate::pipeline::transport::FrameSink;
use crate::pipeline::types::max_frame_bytes;

// ── StreamConfig ─────────────────────────────────────────────────

/// Configuration for [`StreamService`]. Fixed for the lifetime of the
/// stream.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Target frames per second (at least 1).
    pub target_fps: u32,
    /// JPEG quality (0..=100).
    pub quality: u8,
    /// Number of slots in the ring.
    pub buffer_depth: usize,
    /// Pause after a failed upload.
    pub retry_backoff: Duration,
    /// How often the upload loop logs throughput.
    pub report_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            target_fps: 15,
            quality: 85,
            buffer_depth: 3,
            retry_backoff: Duration::from_millis(100),
            report_interval: Duration::from_secs(5),
        }
    }
}

impl StreamConfig {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), FramecastError> {
        if self.buffer_depth == 0 {
            return Err(FramecastError::Config("buffer depth must be at least 1".into()));
        }
        if self.target_fps == 0 {
            return Err(FramecastError::Config("target fps must be at least 1".into()));
        }
        if self.quality > 100 {
            return Err(FramecastError::Config(format!(
                "quality must be within 0..=100, got {}",
                self.quality
            )));
        }
        Ok(())
    }
}

// ── StopHandle ───────────────────────────────────────────────────

/// Cloneable handle that requests shutdown from any thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    pipeline: Arc<Pipeline>,
}

impl StopHandle {
    /// Request shutdown. Returns `true` for the first call only.
    pub fn stop(&self) -> bool {
        self.pipeline.request_shutdown()
    }

    /// Whether shutdown has been requested.
    pub fn is_stopped(&self) -> bool {
        !self.pipeline.is_running()
    }
}

// ── StreamService ────────────────────────────────────────────────

/// Owns the pipeline and the two worker threads.
///
/// Dropping the service without calling [`shutdown`](Self::shutdown)
/// performs the same stop-and-join sequence.
pub struct StreamService {
    pipeline: Arc<Pipeline>,
    stats: Arc<PipelineStats>,
    producer: Option<JoinHandle<()>>,
    consumer: Option<JoinHandle<()>>,
}

impl StreamService {
    /// Allocate the slot store and start both loops.
    ///
    /// Slot buffers are sized `width × height × 4` from the grabber.
    /// Allocation failure is returned before any thread starts.
    pub fn start<G, E, S>(
        config: &StreamConfig,
        grabber: G,
        encoder: E,
        sink: S,
    ) -> Result<Self, FramecastError>
    where
        G: ScreenGrabber + 'static,
        E: FrameEncoder + 'static,
        S: FrameSink + 'static,
    {
        config.validate()?;

        let (width, height) = grabber.dimensions();
        let capacity = max_frame_bytes(width, height);
        if capacity == 0 {
            return Err(FramecastError::Config(format!(
                "display reports an empty size {width}x{height}"
            )));
        }

        let pipeline = Arc::new(Pipeline::new(config.buffer_depth, capacity)?);
        info!(
            depth = config.buffer_depth,
            slot_bytes = capacity,
            "slot store allocated for {width}x{height}"
        );

        let stats = Arc::new(PipelineStats::new());
        let mut capture = CaptureLoop::new(
            grabber,
            encoder,
            config.quality,
            config.target_fps,
            Arc::clone(&stats),
        );
        let mut upload = UploadLoop::new(
            sink,
            config.retry_backoff,
            config.report_interval,
            Arc::clone(&stats),
        );

        let producer = thread::Builder::new().name("framecast-capture".into()).spawn({
            let pipeline = Arc::clone(&pipeline);
            move || capture.run(&pipeline)
        })?;

        let consumer = thread::Builder::new().name("framecast-upload".into()).spawn({
            let pipeline = Arc::clone(&pipeline);
            move || upload.run(&pipeline)
        });
        let consumer = match consumer {
            Ok(handle) => handle,
            Err(e) => {
                pipeline.request_shutdown();
                let _ = producer.join();
                return Err(e.into());
            }
        };

        Ok(Self {
            pipeline,
            stats,
            producer: Some(producer),
            consumer: Some(consumer),
        })
    }

    /// A handle that can stop the stream from another thread or a
    /// signal handler.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            pipeline: Arc::clone(&self.pipeline),
        }
    }

    /// Counters so far.
    pub fn report(&self) -> StreamReport {
        self.stats.snapshot()
    }

    /// The shared coordinator.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Request shutdown, wait for both loops to exit and return the
    /// final counters.
    pub fn shutdown(mut self) -> StreamReport {
        self.stop_and_join();
        let report = self.stats.snapshot();
        info!(%report, "stream stopped");
        report
    }

    fn stop_and_join(&mut self) {
        if self.pipeline.request_shutdown() {
            info!("stopping stream");
        }
        for (name, handle) in [("capture", self.producer.take()), ("upload", self.consumer.take())] {
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    error!("{name} thread panicked");
                }
            }
        }
    }
}

impl Drop for StreamService {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = StreamConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.buffer_depth, 3);
        assert_eq!(cfg.retry_backoff, Duration::from_millis(100));
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let cfg = StreamConfig {
            buffer_depth: 0,
            ..StreamConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(FramecastError::Config(_))));

        let cfg = StreamConfig {
            target_fps: 0,
            ..StreamConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = StreamConfig {
            quality: 101,
            ..StreamConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_accepts_full_quality_range_and_high_fps() {
        for quality in [0, 100] {
            let cfg = StreamConfig {
                quality,
                ..StreamConfig::default()
            };
            assert!(cfg.validate().is_ok(), "quality {quality}");
        }

        let cfg = StreamConfig {
            target_fps: 120,
            ..StreamConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }
}
