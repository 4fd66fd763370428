//! qr_sentinel - scan QR codes and judge the links inside before anyone
//! follows them.
//!
//! The crate is a pipeline:
//!
//! 1. [`decode`] turns an RGBA [`FrameBuffer`] into a [`DecodedPayload`]
//!    (finder scan, sampling, Reed-Solomon, segment parsing).
//! 2. [`normalize::normalize`] turns the text into a [`NormalizedTarget`]
//!    with an absolute URL.
//! 3. [`risk::RiskAssessor`] applies lexical rules and an optional reputation
//!    lookup to produce a [`RiskVerdict`].
//! 4. [`scan::ScanOrchestrator`] drives the whole thing for camera or upload
//!    sources, one attempt at a time.
//!
//! ```
//! use qr_sentinel::{ECLevel, decode, encoder};
//!
//! let symbol = encoder::encode_text("https://example.com", ECLevel::M).unwrap();
//! let frame = encoder::render_rgba(&symbol, 4, 4).unwrap();
//! let payload = decode(&frame).unwrap();
//! assert_eq!(payload.text, "https://example.com");
//! ```

/// Scanner configuration (TOML and `QR_*` environment)
pub mod config;
/// QR symbol decoding (format, Reed-Solomon, segment modes)
pub mod decoder;
/// Finder pattern detection
pub mod detector;
/// QR symbol generation and rendering
pub mod encoder;
/// Errors shared below the orchestrator
pub mod error;
/// Scan history and user settings sink
pub mod history;
/// Subscriber setup for binaries
pub mod logging;
/// Core data structures
pub mod models;
/// Decoded text to absolute URL
pub mod normalize;
/// Frame-level detection
pub mod pipeline;
/// Lexical rules, reputation lookups and verdicts
pub mod risk;
/// Scan orchestration and frame sources
pub mod scan;
/// Image file helpers for the CLI and benches
pub mod tools;
/// Grayscale, binarization and geometry helpers
pub mod utils;

pub use error::NotFound;
pub use models::{
    BitMatrix, DecodedPayload, ECLevel, FrameBuffer, FrameError, MaskPattern, Point, Version,
};
pub use normalize::NormalizedTarget;
pub use pipeline::DetectionTelemetry;
pub use risk::{RiskLevel, RiskVerdict};
pub use scan::{ScanError, ScanOrchestrator, ScanOutcome, ScanSource, ScanState};

use utils::grayscale::rgba_to_grayscale;

/// Decode the first QR symbol in a frame
pub fn decode(frame: &FrameBuffer) -> Result<DecodedPayload, NotFound> {
    let gray = rgba_to_grayscale(frame.data(), frame.width(), frame.height());
    let (mut found, _) = pipeline::detect_gray(&gray, frame.width(), frame.height(), 1);
    if found.is_empty() {
        return Err(NotFound);
    }
    Ok(found.swap_remove(0))
}

/// Decode from raw RGBA bytes. A buffer that does not match the dimensions
/// is reported as [`NotFound`].
pub fn decode_rgba(bytes: &[u8], width: usize, height: usize) -> Result<DecodedPayload, NotFound> {
    let expected = width
        .checked_mul(height)
        .and_then(|px| px.checked_mul(FrameBuffer::CHANNELS));
    if width == 0 || height == 0 || expected != Some(bytes.len()) {
        tracing::trace!(width, height, len = bytes.len(), "rejected rgba buffer");
        return Err(NotFound);
    }
    let gray = rgba_to_grayscale(bytes, width, height);
    let (mut found, _) = pipeline::detect_gray(&gray, width, height, 1);
    if found.is_empty() {
        return Err(NotFound);
    }
    Ok(found.swap_remove(0))
}

/// Every symbol in a frame
pub fn detect(frame: &FrameBuffer) -> Vec<DecodedPayload> {
    detect_with_telemetry(frame).0
}

/// [`detect`] plus counters describing what the pipeline tried
pub fn detect_with_telemetry(frame: &FrameBuffer) -> (Vec<DecodedPayload>, DetectionTelemetry) {
    let gray = rgba_to_grayscale(frame.data(), frame.width(), frame.height());
    pipeline::detect_gray(
        &gray,
        frame.width(),
        frame.height(),
        decoder::config::max_groups(),
    )
}
