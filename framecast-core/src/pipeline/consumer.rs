//! Upload consumer loop: slot → HTTP POST → release, with a fixed
//! backoff after failures.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, trace, warn};

use crate::error::TransferError;
use crate::pipeline::coordinator::Pipeline;
use crate::pipeline::stats::PipelineStats;
use crate::pipeline::transport::FrameSink;

/// Result of a single consumer iteration.
#[derive(Debug)]
pub enum UploadOutcome {
    /// Frame `sequence` was accepted by the collector.
    Delivered { sequence: u64, bytes: usize },
    /// Frame `sequence` was dropped; the backoff has already elapsed.
    Dropped {
        sequence: u64,
        error: TransferError,
    },
    /// Shutdown was observed while waiting for a frame.
    Stopped,
}

// ── UploadLoop ───────────────────────────────────────────────────

/// The consumer side of the pipeline.
///
/// The slot is released only after the transfer has finished, so the
/// producer can never overwrite a buffer that is still being sent. A
/// failed frame is dropped, never re-sent.
pub struct UploadLoop<S> {
    sink: S,
    retry_backoff: Duration,
    report_interval: Duration,
    window: ThroughputWindow,
    stats: Arc<PipelineStats>,
}

impl<S: FrameSink> UploadLoop<S> {
    pub fn new(
        sink: S,
        retry_backoff: Duration,
        report_interval: Duration,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            sink,
            retry_backoff,
            report_interval,
            window: ThroughputWindow::new(Instant::now()),
            stats,
        }
    }

    /// Run until shutdown is requested.
    pub fn run(&mut self, pipeline: &Pipeline) {
        info!(
            backoff_ms = self.retry_backoff.as_millis() as u64,
            "upload loop started"
        );
        self.window = ThroughputWindow::new(Instant::now());

        loop {
            if let UploadOutcome::Stopped = self.run_once(pipeline) {
                break;
            }

            let now = Instant::now();
            if now.duration_since(self.window.started) >= self.report_interval {
                let sample = self.window.take(now);
                let report = self.stats.snapshot();
                info!(
                    uploaded = report.frames_uploaded,
                    failed = report.upload_failures,
                    frames = sample.frames,
                    bytes_per_sec = sample.bytes_per_sec,
                    latency_ms = sample.mean_latency.as_millis() as u64,
                    "upload throughput"
                );
            }
        }

        info!("upload loop stopped");
    }

    /// Take the next frame, upload it, release it. On failure, waits
    /// out the backoff before returning.
    pub fn run_once(&mut self, pipeline: &Pipeline) -> UploadOutcome {
        let Some(mut frame) = pipeline.acquire_consumer_slot() else {
            return UploadOutcome::Stopped;
        };
        let sequence = frame.sequence();
        let bytes = frame.len();

        // The lock is not held here; the slot stays `Reading` (filled)
        // until it is released below.
        let started = Instant::now();
        let result = self.sink.send_frame(frame.to_bytes());
        pipeline.release(frame);

        match result {
            Ok(()) => {
                self.window.record(bytes, started.elapsed());
                self.stats.uploaded(bytes);
                trace!(seq = sequence, bytes, "frame uploaded");
                UploadOutcome::Delivered { sequence, bytes }
            }
            Err(error) => {
                warn!(seq = sequence, error = %error, "failed to send frame");
                self.stats.upload_failed();
                pipeline.sleep_unless_stopped(self.retry_backoff);
                UploadOutcome::Dropped { sequence, error }
            }
        }
    }
}

// ── ThroughputWindow ─────────────────────────────────────────────

/// Deliveries since the last throughput line. Reset on every report,
/// so a stalled upload reports zero instead of an old rate.
#[derive(Debug)]
struct ThroughputWindow {
    started: Instant,
    frames: u64,
    bytes: u64,
    latency: Duration,
}

#[derive(Debug, PartialEq, Eq)]
struct ThroughputSample {
    frames: u64,
    bytes_per_sec: u64,
    mean_latency: Duration,
}

impl ThroughputWindow {
    fn new(started: Instant) -> Self {
        Self {
            started,
            frames: 0,
            bytes: 0,
            latency: Duration::ZERO,
        }
    }

    fn record(&mut self, bytes: usize, latency: Duration) {
        self.frames += 1;
        self.bytes += bytes as u64;
        self.latency += latency;
    }

    /// Summarise the window ending at `now` and start a new one.
    fn take(&mut self, now: Instant) -> ThroughputSample {
        let elapsed = now
            .duration_since(self.started)
            .max(Duration::from_millis(1));
        let sample = ThroughputSample {
            frames: self.frames,
            bytes_per_sec: (self.bytes as f64 / elapsed.as_secs_f64()) as u64,
            mean_latency: match u32::try_from(self.frames) {
                Ok(n) if n > 0 => self.latency / n,
                _ => Duration::ZERO,
            },
        };
        *self = Self::new(now);
        sample
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Sink that records every frame and replays scripted results.
    struct RecordingSink {
        results: VecDeque<Result<(), TransferError>>,
        seen: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl FrameSink for RecordingSink {
        fn send_frame(&mut self, frame: Bytes) -> Result<(), TransferError> {
            self.seen.lock().unwrap().push(frame.to_vec());
            self.results.pop_front().unwrap_or(Ok(()))
        }
    }

    fn upload_loop(
        results: Vec<Result<(), TransferError>>,
        backoff: Duration,
    ) -> (UploadLoop<RecordingSink>, Arc<Mutex<Vec<Vec<u8>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            results: results.into(),
            seen: Arc::clone(&seen),
        };
        let up = UploadLoop::new(
            sink,
            backoff,
            Duration::from_secs(5),
            Arc::new(PipelineStats::new()),
        );
        (up, seen)
    }

    fn publish(pipeline: &Pipeline, bytes: &[u8]) {
        let mut slot = pipeline.acquire_producer_slot().unwrap();
        let len = slot.fill(bytes).unwrap();
        pipeline.publish(slot, len);
    }

    #[test]
    fn delivers_and_releases() {
        let pipeline = Pipeline::new(3, 16).unwrap();
        publish(&pipeline, b"frame-0");
        let (mut up, seen) = upload_loop(vec![], Duration::from_millis(100));

        match up.run_once(&pipeline) {
            UploadOutcome::Delivered { sequence, bytes } => {
                assert_eq!(sequence, 0);
                assert_eq!(bytes, 7);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(seen.lock().unwrap().as_slice(), &[b"frame-0".to_vec()]);
        assert_eq!(pipeline.filled_count(), 0);
        assert_eq!(up.stats.snapshot().bytes_uploaded, 7);
    }

    #[test]
    fn failed_frame_is_dropped_after_backoff() {
        let pipeline = Pipeline::new(3, 16).unwrap();
        publish(&pipeline, b"a");
        publish(&pipeline, b"b");
        let (mut up, seen) = upload_loop(
            vec![Err(TransferError::Timeout(Duration::from_secs(10)))],
            Duration::from_millis(100),
        );

        let start = Instant::now();
        let outcome = up.run_once(&pipeline);
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(matches!(
            outcome,
            UploadOutcome::Dropped {
                sequence: 0,
                error: TransferError::Timeout(_)
            }
        ));
        // Released even though the upload failed.
        assert_eq!(pipeline.filled_count(), 1);

        // The next iteration moves on to the next frame; "a" is not re-sent.
        assert!(matches!(
            up.run_once(&pipeline),
            UploadOutcome::Delivered { sequence: 1, .. }
        ));
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[b"a".to_vec(), b"b".to_vec()]
        );

        let report = up.stats.snapshot();
        assert_eq!(report.upload_failures, 1);
        assert_eq!(report.frames_uploaded, 1);
    }

    #[test]
    fn slot_stays_filled_during_transfer() {
        struct InspectingSink(Arc<Pipeline>, Option<usize>);
        impl FrameSink for InspectingSink {
            fn send_frame(&mut self, _frame: Bytes) -> Result<(), TransferError> {
                self.1 = Some(self.0.filled_count());
                Ok(())
            }
        }

        let pipeline = Arc::new(Pipeline::new(2, 8).unwrap());
        publish(&pipeline, b"x");
        let mut up = UploadLoop::new(
            InspectingSink(Arc::clone(&pipeline), None),
            Duration::from_millis(1),
            Duration::from_secs(5),
            Arc::new(PipelineStats::new()),
        );
        up.run_once(&pipeline);
        assert_eq!(up.sink.1, Some(1));
        assert_eq!(pipeline.filled_count(), 0);
    }

    #[test]
    fn stops_on_shutdown() {
        let pipeline = Pipeline::new(2, 8).unwrap();
        pipeline.request_shutdown();
        let (mut up, seen) = upload_loop(vec![], Duration::from_millis(1));
        up.run(&pipeline);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn throughput_window_reports_rate_and_latency() {
        let t0 = Instant::now();
        let mut window = ThroughputWindow::new(t0);
        window.record(600_000, Duration::from_millis(30));
        window.record(400_000, Duration::from_millis(10));

        let sample = window.take(t0 + Duration::from_secs(2));
        assert_eq!(sample.frames, 2);
        assert_eq!(sample.bytes_per_sec, 500_000);
        assert_eq!(sample.mean_latency, Duration::from_millis(20));
    }

    #[test]
    fn stalled_upload_reports_zero_throughput() {
        let t0 = Instant::now();
        let mut window = ThroughputWindow::new(t0);
        window.record(1_000_000, Duration::from_millis(50));
        assert!(window.take(t0 + Duration::from_secs(1)).bytes_per_sec > 0);

        // Nothing delivered during the next interval.
        let sample = window.take(t0 + Duration::from_secs(6));
        assert_eq!(
            sample,
            ThroughputSample {
                frames: 0,
                bytes_per_sec: 0,
                mean_latency: Duration::ZERO,
            }
        );
    }
}
