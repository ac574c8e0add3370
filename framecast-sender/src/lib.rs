//! # framecast-sender: Screen Streaming Sender
//!
//! Captures the primary (or a chosen) display, encodes each frame as
//! JPEG and POSTs it to a remote collector at a bounded frame rate.
//! Capture and upload run on separate threads joined by a fixed-depth
//! frame ring, so a slow network throttles capture instead of stalling
//! it or dropping frames.
//!
//! ## Stopping
//!
//! Press Enter, send Ctrl-C, or (on Unix) SIGTERM.

pub mod config;
pub mod service;
