//! Errors raised below the scan orchestrator.
use thiserror::Error;

/// No decodable symbol in the frame. Also covers corrupt symbols and
/// invalid buffers; the decoder has no other failure mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Error)]
#[error("no QR code found")]
pub struct NotFound;

impl NotFound {
    pub fn classification(&self) -> &'static str {
        "not_found"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The user or platform refused camera access
    #[error("camera permission denied")]
    PermissionDenied,

    /// Hardware failure or incompatible device
    #[error("capture failed: {0}")]
    Failure(String),
}

impl CaptureError {
    pub fn classification(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied => "permission_denied",
            CaptureError::Failure(_) => "capture_failure",
        }
    }
}

#[derive(Debug, Error)]
pub enum StaticImageError {
    #[error("unsupported upload '{0}' (expected png, jpg or jpeg)")]
    UnsupportedFormat(String),

    #[error("invalid image: {0}")]
    InvalidImage(#[from] image::ImageError),

    #[error("invalid image: {0}")]
    Frame(#[from] crate::models::FrameError),
}

impl StaticImageError {
    pub fn classification(&self) -> &'static str {
        "invalid_image"
    }
}
