//! Frame compression.
//!
//! [`FrameEncoder`] is the seam the producer loop calls into;
//! [`JpegFrameEncoder`] implements it with the `image` crate's baseline
//! JPEG encoder.
//!
//! Raw frames are first packed into tight RGB rows (dropping alpha and
//! row padding, swizzling BGRA), optionally downscaled to a fixed width
//! with the aspect ratio preserved, then encoded at the requested
//! quality.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, RgbImage};

use crate::error::FramecastError;
use crate::pipeline::types::{PixelFormat, RawScreenFrame};

// ── FrameEncoder ─────────────────────────────────────────────────

/// Compresses raw frames into a byte buffer.
pub trait FrameEncoder: Send {
    /// Encode `frame` at `quality` (0..=100) into `out`, replacing its
    /// previous contents. An error means the frame is skipped.
    fn encode(
        &mut self,
        frame: &RawScreenFrame,
        quality: u8,
        out: &mut Vec<u8>,
    ) -> Result<(), FramecastError>;
}

// ── JpegFrameEncoder ─────────────────────────────────────────────

/// Baseline JPEG encoder with an optional fixed output width.
#[derive(Debug, Default)]
pub struct JpegFrameEncoder {
    /// Frames wider than this are scaled down to it; `None` keeps the
    /// native resolution.
    scale_width: Option<u32>,
    /// Number of frames encoded so far.
    frame_count: u64,
}

impl JpegFrameEncoder {
    /// Encoder that keeps the native resolution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoder that scales frames down to `width` pixels wide. A width
    /// of 0 keeps the native resolution.
    pub fn with_scale_width(width: u32) -> Self {
        Self {
            scale_width: (width > 0).then_some(width),
            frame_count: 0,
        }
    }

    /// Number of frames encoded so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Output size for a `width`×`height` source.
    pub fn output_size(&self, width: u32, height: u32) -> (u32, u32) {
        match self.scale_width {
            Some(target) if width > target => {
                let scaled = (height as u64 * target as u64 / width as u64).max(1);
                (target, scaled as u32)
            }
            _ => (width, height),
        }
    }

    // ── Internal helpers ─────────────────────────────────────────

    /// Pack visible pixels into tightly packed RGB.
    fn to_rgb(frame: &RawScreenFrame) -> Result<RgbImage, FramecastError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(FramecastError::Encode("empty frame".into()));
        }
        if !frame.is_complete() {
            return Err(FramecastError::Encode(format!(
                "frame buffer holds {} bytes, {}x{} needs {}",
                frame.data.len(),
                frame.width,
                frame.height,
                frame.byte_len()
            )));
        }

        let mut rgb = Vec::with_capacity(frame.width as usize * frame.height as usize * 3);
        for y in 0..frame.height {
            let row = frame.row(y);
            match frame.format {
                PixelFormat::Rgb8 => rgb.extend_from_slice(row),
                PixelFormat::Rgba8 => {
                    for px in row.chunks_exact(4) {
                        rgb.extend_from_slice(&px[..3]);
                    }
                }
                PixelFormat::Bgra8 => {
                    for px in row.chunks_exact(4) {
                        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
                    }
                }
            }
        }

        RgbImage::from_raw(frame.width, frame.height, rgb)
            .ok_or_else(|| FramecastError::Encode("pixel buffer size mismatch".into()))
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn encode(
        &mut self,
        frame: &RawScreenFrame,
        quality: u8,
        out: &mut Vec<u8>,
    ) -> Result<(), FramecastError> {
        let mut rgb = Self::to_rgb(frame)?;

        let (width, height) = self.output_size(frame.width, frame.height);
        if (width, height) != (frame.width, frame.height) {
            rgb = imageops::resize(&rgb, width, height, FilterType::Triangle);
        }

        out.clear();
        // The JPEG quantiser has no level 0.
        JpegEncoder::new_with_quality(&mut *out, quality.clamp(1, 100))
            .encode(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
            .map_err(|e| FramecastError::Encode(e.to_string()))?;

        self.frame_count += 1;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
