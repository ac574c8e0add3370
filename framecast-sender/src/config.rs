//! Configuration for the sender.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use framecast_core::{FramecastError, StreamConfig};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Collector settings.
    pub upload: UploadConfig,
    /// Screen capture settings.
    pub screen: ScreenConfig,
    /// Frame ring settings.
    pub pipeline: PipelineConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Collector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Endpoint every frame is POSTed to.
    pub url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Pause after a failed upload, in milliseconds.
    pub retry_backoff_ms: u64,
}

/// Screen capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Target frames per second.
    pub fps: u32,
    /// JPEG quality, 0..=100.
    pub quality: u8,
    /// Monitor index to capture (0 = primary).
    pub monitor_index: usize,
    /// Scale frames down to this width before encoding (0 = native).
    pub scale_width: u32,
}

/// Frame ring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of frame slots between capture and upload.
    pub buffer_depth: usize,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/upload".into(),
            timeout_secs: 10,
            retry_backoff_ms: 100,
        }
    }
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            fps: 15,
            quality: 85,
            monitor_index: 0,
            scale_width: 0,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { buffer_depth: 3 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl SenderConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults. A file that exists but cannot
    /// be read or parsed is an error, so a typo never silently turns
    /// into a default collector URL.
    pub fn try_load(path: &Path) -> Result<Self, FramecastError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(FramecastError::Config(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };
        toml::from_str(&contents)
            .map_err(|e| FramecastError::Config(format!("{}: {e}", path.display())))
    }

    /// Per-request upload timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.upload.timeout_secs.max(1))
    }

    /// Convert the file settings into a [`StreamConfig`], clamping
    /// out-of-range values.
    pub fn to_stream_config(&self) -> StreamConfig {
        StreamConfig {
            target_fps: self.screen.fps.max(1),
            quality: self.screen.quality.min(100),
            buffer_depth: self.pipeline.buffer_depth.max(1),
            retry_backoff: Duration::from_millis(self.upload.retry_backoff_ms),
            ..StreamConfig::default()
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
