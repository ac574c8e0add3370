//! Capture producer loop: grab → encode → slot, paced to a target FPS.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::pipeline::capture::ScreenGrabber;
use crate::pipeline::coordinator::Pipeline;
use crate::pipeline::encoder::FrameEncoder;
use crate::pipeline::stats::PipelineStats;

/// Result of a single producer iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A frame of `bytes` bytes went into slot `slot`.
    Published { slot: usize, bytes: usize },
    /// Nothing was published (no image, encode failure, oversize).
    Skipped,
    /// Shutdown was observed while waiting for a slot.
    Stopped,
}

// ── CaptureLoop ──────────────────────────────────────────────────

/// The producer side of the pipeline.
///
/// Failures to grab or encode skip the iteration; they never reach the
/// consumer. The only place this loop blocks is
/// [`Pipeline::acquire_producer_slot`], which is how backpressure from
/// a slow upload throttles capture.
pub struct CaptureLoop<G, E> {
    grabber: G,
    encoder: E,
    quality: u8,
    frame_interval: Duration,
    /// Encoder output, reused across iterations.
    scratch: Vec<u8>,
    stats: Arc<PipelineStats>,
}

impl<G: ScreenGrabber, E: FrameEncoder> CaptureLoop<G, E> {
    pub fn new(
        grabber: G,
        encoder: E,
        quality: u8,
        target_fps: u32,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            grabber,
            encoder,
            quality,
            frame_interval: frame_interval(target_fps),
            scratch: Vec::new(),
            stats,
        }
    }

    /// Time budget of one iteration.
    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Run until shutdown is requested.
    pub fn run(&mut self, pipeline: &Pipeline) {
        info!(
            interval_us = self.frame_interval.as_micros() as u64,
            quality = self.quality,
            "capture loop started"
        );

        while pipeline.is_running() {
            let loop_start = Instant::now();

            if self.run_once(pipeline) == CaptureOutcome::Stopped {
                break;
            }

            if !pace(pipeline, loop_start, self.frame_interval) {
                break;
            }
        }

        info!("capture loop stopped");
    }

    /// One grab → encode → publish step, without pacing.
    pub fn run_once(&mut self, pipeline: &Pipeline) -> CaptureOutcome {
        // 1. Capture.
        let raw = match self.grabber.grab() {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "no display image; skipping frame");
                self.stats.capture_skipped();
                return CaptureOutcome::Skipped;
            }
        };

        // 2. Encode.
        if let Err(e) = self.encoder.encode(&raw, self.quality, &mut self.scratch) {
            debug!(error = %e, "encode failed; skipping frame");
            self.stats.encode_skipped();
            return CaptureOutcome::Skipped;
        }

        let capacity = pipeline.slot_capacity();
        if self.scratch.len() > capacity {
            warn!(bytes = self.scratch.len(), capacity, "encoded frame exceeds slot; dropping");
            self.stats.oversize_skipped();
            return CaptureOutcome::Skipped;
        }

        // 3. Hand off. Blocks while every slot is filled.
        let Some(mut slot) = pipeline.acquire_producer_slot() else {
            return CaptureOutcome::Stopped;
        };
        let index = slot.index();
        match slot.fill(&self.scratch) {
            Ok(len) => {
                pipeline.publish(slot, len);
                self.stats.published();
                trace!(slot = index, bytes = len, "frame captured");
                CaptureOutcome::Published { slot: index, bytes: len }
            }
            Err(e) => {
                warn!(error = %e, "frame rejected by slot; dropping");
                self.stats.oversize_skipped();
                CaptureOutcome::Skipped
            }
        }
    }
}

/// `1_000_000 µs / fps`; a zero FPS is treated as 1.
pub fn frame_interval(target_fps: u32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(target_fps.max(1)))
}

/// Sleep for the remainder of the frame interval. Returns `false` if
/// shutdown was requested meanwhile.
fn pace(pipeline: &Pipeline, loop_start: Instant, interval: Duration) -> bool {
    let elapsed = loop_start.elapsed();
    if elapsed < interval {
        pipeline.sleep_unless_stopped(interval - elapsed)
    } else {
        true
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FramecastError;
    use crate::pipeline::types::RawScreenFrame;
    use std::collections::VecDeque;

    /// Grabber that replays a script of hit / miss results.
    struct ScriptedGrabber {
        script: VecDeque<bool>,
        grabs: usize,
    }

    impl ScreenGrabber for ScriptedGrabber {
        fn dimensions(&self) -> (u32, u32) {
            (4, 4)
        }

        fn grab(&mut self) -> Result<RawScreenFrame, FramecastError> {
            self.grabs += 1;
            if self.script.pop_front().unwrap_or(true) {
                Ok(RawScreenFrame::from_rgba(4, 4, vec![self.grabs as u8; 64]))
            } else {
                Err(FramecastError::Capture("no image".into()))
            }
        }
    }

    /// Encoder that emits `len` copies of the first pixel byte.
    struct FixedEncoder {
        len: usize,
        fail: bool,
    }

    impl FrameEncoder for FixedEncoder {
        fn encode(
            &mut self,
            frame: &RawScreenFrame,
            _quality: u8,
            out: &mut Vec<u8>,
        ) -> Result<(), FramecastError> {
            if self.fail {
                return Err(FramecastError::Encode("boom".into()));
            }
            out.clear();
            out.resize(self.len, frame.data[0]);
            Ok(())
        }
    }

    fn capture_loop(script: &[bool], len: usize, fail: bool) -> CaptureLoop<ScriptedGrabber, FixedEncoder> {
        CaptureLoop::new(
            ScriptedGrabber {
                script: script.iter().copied().collect(),
                grabs: 0,
            },
            FixedEncoder { len, fail },
            85,
            15,
            Arc::new(PipelineStats::new()),
        )
    }

    #[test]
    fn interval_from_fps() {
        assert_eq!(frame_interval(15), Duration::from_micros(66_666));
        assert_eq!(frame_interval(1), Duration::from_secs(1));
        assert_eq!(frame_interval(0), Duration::from_secs(1));
    }

    #[test]
    fn publishes_encoded_bytes() {
        let pipeline = Pipeline::new(3, 64).unwrap();
        let mut cap = capture_loop(&[true], 10, false);

        let outcome = cap.run_once(&pipeline);
        assert_eq!(outcome, CaptureOutcome::Published { slot: 0, bytes: 10 });

        let frame = pipeline.acquire_consumer_slot().unwrap();
        assert_eq!(frame.bytes(), &[1u8; 10][..]);
        assert_eq!(cap.stats.snapshot().frames_published, 1);
    }

    #[test]
    fn missing_image_skips_without_touching_slots() {
        let pipeline = Pipeline::new(3, 64).unwrap();
        let mut cap = capture_loop(&[false, false], 10, false);

        assert_eq!(cap.run_once(&pipeline), CaptureOutcome::Skipped);
        assert_eq!(cap.run_once(&pipeline), CaptureOutcome::Skipped);
        assert_eq!(pipeline.filled_count(), 0);
        assert_eq!(pipeline.cursors(), (0, 0));

        let report = cap.stats.snapshot();
        assert_eq!(report.capture_skips, 2);
        assert_eq!(report.frames_published, 0);
    }

    #[test]
    fn encode_failure_skips() {
        let pipeline = Pipeline::new(3, 64).unwrap();
        let mut cap = capture_loop(&[true], 10, true);
        assert_eq!(cap.run_once(&pipeline), CaptureOutcome::Skipped);
        assert_eq!(cap.stats.snapshot().encode_skips, 1);
        assert_eq!(pipeline.filled_count(), 0);
    }

    #[test]
    fn oversize_frame_is_dropped() {
        let pipeline = Pipeline::new(3, 8).unwrap();
        let mut cap = capture_loop(&[true], 9, false);
        assert_eq!(cap.run_once(&pipeline), CaptureOutcome::Skipped);
        assert_eq!(cap.stats.snapshot().oversize_skips, 1);
        assert_eq!(pipeline.filled_count(), 0);
    }

    #[test]
    fn stops_when_shutdown_requested() {
        let pipeline = Pipeline::new(1, 64).unwrap();
        pipeline.request_shutdown();
        let mut cap = capture_loop(&[true], 4, false);
        assert_eq!(cap.run_once(&pipeline), CaptureOutcome::Stopped);
    }

    #[test]
    fn pacing_sleeps_even_when_capture_fails() {
        let pipeline = std::sync::Arc::new(Pipeline::new(2, 64).unwrap());
        // 20 FPS → 50 ms per iteration; every grab misses.
        let mut cap = CaptureLoop::new(
            ScriptedGrabber {
                script: std::iter::repeat(false).take(1000).collect(),
                grabs: 0,
            },
            FixedEncoder { len: 4, fail: false },
            85,
            20,
            Arc::new(PipelineStats::new()),
        );

        let stopper = {
            let pipeline = Arc::clone(&pipeline);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(260));
                pipeline.request_shutdown();
            })
        };
        cap.run(&pipeline);
        stopper.join().unwrap();

        // Roughly 6 iterations in 260 ms, certainly not hundreds.
        let grabs = cap.grabber.grabs;
        assert!((2..=12).contains(&grabs), "grabs = {grabs}");
        assert_eq!(pipeline.filled_count(), 0);
    }
}
