//! Display capture.
//!
//! [`ScreenGrabber`] is the seam the producer loop calls into;
//! [`XcapGrabber`] implements it with the cross-platform `xcap` crate
//! (CoreGraphics on macOS, DXGI/GDI on Windows, X11/Wayland on Linux).

use crate::error::FramecastError;
use crate::pipeline::types::RawScreenFrame;

// ── ScreenGrabber ────────────────────────────────────────────────

/// Produces raw images of one display.
pub trait ScreenGrabber: Send {
    /// Display size in pixels, fixed for the lifetime of the grabber.
    /// Used to size the slot buffers.
    fn dimensions(&self) -> (u32, u32);

    /// Grab one image. An error means "no image this time"; the
    /// producer skips the iteration.
    fn grab(&mut self) -> Result<RawScreenFrame, FramecastError>;
}

// ── XcapGrabber ──────────────────────────────────────────────────

/// Captures a single monitor through `xcap`.
///
/// Only the monitor id is kept between grabs; the monitor handle is
/// looked up again on every grab so the grabber stays `Send` on every
/// platform.
pub struct XcapGrabber {
    monitor_id: u32,
    name: String,
    width: u32,
    height: u32,
}

impl XcapGrabber {
    /// Grab the primary display.
    pub fn primary() -> Result<Self, FramecastError> {
        let monitors = Self::monitors()?;
        let monitor = monitors
            .iter()
            .find(|m| m.is_primary())
            .or_else(|| monitors.first())
            .ok_or_else(|| FramecastError::Capture("no display found".into()))?;
        Ok(Self::from_monitor(monitor))
    }

    /// Grab display number `index` in enumeration order; `0` selects
    /// the primary display.
    pub fn by_index(index: usize) -> Result<Self, FramecastError> {
        if index == 0 {
            return Self::primary();
        }
        let monitors = Self::monitors()?;
        let monitor = monitors.get(index).ok_or_else(|| {
            FramecastError::Capture(format!(
                "display {index} not found ({} available)",
                monitors.len()
            ))
        })?;
        Ok(Self::from_monitor(monitor))
    }

    /// Human-readable monitor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn monitors() -> Result<Vec<xcap::Monitor>, FramecastError> {
        xcap::Monitor::all()
            .map_err(|e| FramecastError::Capture(format!("enumerating displays failed: {e}")))
    }

    fn from_monitor(monitor: &xcap::Monitor) -> Self {
        Self {
            monitor_id: monitor.id(),
            name: monitor.name().to_string(),
            width: monitor.width(),
            height: monitor.height(),
        }
    }
}

impl ScreenGrabber for XcapGrabber {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn grab(&mut self) -> Result<RawScreenFrame, FramecastError> {
        let monitor = Self::monitors()?
            .into_iter()
            .find(|m| m.id() == self.monitor_id)
            .ok_or_else(|| {
                FramecastError::Capture(format!("display {} disappeared", self.monitor_id))
            })?;

        let image = monitor
            .capture_image()
            .map_err(|e| FramecastError::Capture(e.to_string()))?;
        let (width, height) = (image.width(), image.height());

        Ok(RawScreenFrame::from_rgba(width, height, image.into_raw()))
    }
}
