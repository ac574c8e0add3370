//! Sender service: wires the real capabilities into a
//! [`StreamService`] and runs it until an operator stop signal.

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use framecast_core::{
    FramecastError, HttpUploader, JpegFrameEncoder, ScreenGrabber, StreamReport, StreamService,
    XcapGrabber,
};

use crate::config::SenderConfig;

// ── SenderService ────────────────────────────────────────────────

/// The top-level sender.
///
/// Owns the configuration; [`run`](Self::run) builds the grabber,
/// encoder and uploader, starts the stream, blocks until a stop signal
/// arrives and shuts the stream down.
pub struct SenderService {
    config: SenderConfig,
}

impl SenderService {
    /// Create a new sender with the given config.
    pub fn new(config: SenderConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// Build the capabilities and start both loops.
    ///
    /// Must not be called from inside an async runtime: the blocking
    /// HTTP client refuses to live there.
    pub fn start(&self) -> Result<StreamService, FramecastError> {
        // Validate the collector first; it needs no display.
        let uploader = HttpUploader::new(&self.config.upload.url, self.config.request_timeout())?;

        let grabber = XcapGrabber::by_index(self.config.screen.monitor_index)?;
        let (width, height) = grabber.dimensions();
        info!("capturing display {:?} ({width}x{height})", grabber.name());

        let encoder = JpegFrameEncoder::with_scale_width(self.config.screen.scale_width);
        if self.config.screen.scale_width > 0 {
            let (w, h) = encoder.output_size(width, height);
            info!("frames scaled to {w}x{h}");
        }

        info!("uploading to {}", uploader.url());
        StreamService::start(&self.config.to_stream_config(), grabber, encoder, uploader)
    }

    /// Run until Enter, Ctrl-C or SIGTERM, then shut down and return
    /// the final counters.
    ///
    /// 1. Starts the stream (fails fast if slot allocation fails).
    /// 2. Waits for a stop signal on a small current-thread runtime.
    /// 3. Requests shutdown and joins both loops.
    pub fn run(&self) -> Result<StreamReport, FramecastError> {
        let stream = self.start()?;

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(wait_for_stop_signal());
        // A pending stdin read would otherwise hold the runtime open.
        rt.shutdown_background();

        Ok(stream.shutdown())
    }
}

// ── Stop trigger ─────────────────────────────────────────────────

/// Resolves on the first of: a line on stdin, Ctrl-C, SIGTERM.
pub async fn wait_for_stop_signal() {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("ctrl-c handler failed: {e}");
            }
            info!("Ctrl-C received, shutting down");
        }
        _ = terminate() => info!("SIGTERM received, shutting down"),
        _ = enter_pressed() => info!("stop requested from console"),
    }
}

async fn enter_pressed() {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    match lines.next_line().await {
        Ok(Some(_)) => {}
        Ok(None) | Err(_) => {
            debug!("stdin closed; only signals can stop the stream");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sig) => {
            sig.recv().await;
        }
        Err(e) => {
            warn!("cannot listen for SIGTERM: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

// ── Tests ────────────────────────────────────────────────────────
