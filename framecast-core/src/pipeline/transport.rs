//! Frame upload to the remote collector.
//!
//! Wire contract: one HTTP `POST` per frame to the configured URL with
//! `Content-Type: image/jpeg` and the encoded bytes as the body, no
//! extra framing. Any 2xx status is success; the response body is
//! ignored.

use std::time::Duration;

use bytes::Bytes;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;

use crate::error::{FramecastError, TransferError};

/// MIME type of every uploaded frame.
pub const FRAME_CONTENT_TYPE: &str = "image/jpeg";

// ── FrameSink ────────────────────────────────────────────────────

/// Destination for encoded frames.
pub trait FrameSink: Send {
    /// Deliver one frame, blocking until it is accepted or has failed.
    ///
    /// `frame` is a view of the slot buffer, not a copy. The slot stays
    /// checked out until this returns.
    fn send_frame(&mut self, frame: Bytes) -> Result<(), TransferError>;
}

// ── HttpUploader ─────────────────────────────────────────────────

/// Blocking HTTP uploader built on `reqwest::blocking`.
///
/// Must be created and dropped outside of any async runtime; the
/// consumer loop owns it on its own OS thread.
#[derive(Debug)]
pub struct HttpUploader {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl HttpUploader {
    /// Create an uploader posting to `url` with a per-request `timeout`.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, FramecastError> {
        let url = Url::parse(url)
            .map_err(|e| FramecastError::Config(format!("invalid upload url {url:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FramecastError::Config(format!(
                "upload url must be http or https, got {}",
                url.scheme()
            )));
        }
        if timeout.is_zero() {
            return Err(FramecastError::Config("request timeout must be non-zero".into()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FramecastError::Other(format!("building http client failed: {e}")))?;

        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    /// Collector endpoint.
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn classify(&self, err: reqwest::Error) -> TransferError {
        if err.is_timeout() {
            TransferError::Timeout(self.timeout)
        } else if let Some(status) = err.status() {
            TransferError::Status(status.as_u16())
        } else {
            TransferError::Network(err.to_string())
        }
    }
}

impl FrameSink for HttpUploader {
    fn send_frame(&mut self, frame: Bytes) -> Result<(), TransferError> {
        // Each request is built from scratch; nothing carries over from
        // a previous (possibly failed) attempt.
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, FRAME_CONTENT_TYPE)
            .body(frame)
            .send()
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status(status.as_u16()));
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_url() {
        let err = HttpUploader::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, FramecastError::Config(_)));
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = HttpUploader::new("ftp://localhost/upload", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, FramecastError::Config(_)));
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = HttpUploader::new("http://localhost/upload", Duration::ZERO).unwrap_err();
        assert!(matches!(err, FramecastError::Config(_)));
    }

    #[test]
    fn unreachable_collector_is_a_network_error() {
        // Port 9 (discard) on localhost is essentially never listening.
        let mut up = HttpUploader::new("http://127.0.0.1:9/upload", Duration::from_secs(2)).unwrap();
        let err = up
            .send_frame(Bytes::from_static(b"\xFF\xD8\xFF\xD9"))
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::Network(_) | TransferError::Timeout(_)
        ));
    }
}
