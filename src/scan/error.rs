use crate::error::{CaptureError, NotFound, StaticImageError};
use crate::scan::ScanMode;
use thiserror::Error;

/// Terminal failure of one scan attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("no QR code found")]
    NotFound,

    #[error("camera permission denied")]
    PermissionDenied,

    #[error("capture failed: {0}")]
    CaptureFailure(String),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("a scan is already in progress")]
    Busy,

    #[error("scan cancelled")]
    Cancelled,
}

impl ScanError {
    /// Stable identifier for callers and logs
    pub fn classification(&self) -> &'static str {
        match self {
            ScanError::NotFound => "not_found",
            ScanError::PermissionDenied => "permission_denied",
            ScanError::CaptureFailure(_) => "capture_failure",
            ScanError::InvalidImage(_) => "invalid_image",
            ScanError::Busy => "busy",
            ScanError::Cancelled => "cancelled",
        }
    }

    /// Mode the caller should offer instead, if any
    pub fn fallback_mode(&self) -> Option<ScanMode> {
        match self {
            ScanError::PermissionDenied => Some(ScanMode::Upload),
            _ => None,
        }
    }
}

impl From<NotFound> for ScanError {
    fn from(_: NotFound) -> Self {
        ScanError::NotFound
    }
}

impl From<CaptureError> for ScanError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::PermissionDenied => ScanError::PermissionDenied,
            CaptureError::Failure(reason) => ScanError::CaptureFailure(reason),
        }
    }
}

impl From<StaticImageError> for ScanError {
    fn from(err: StaticImageError) -> Self {
        ScanError::InvalidImage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifications() {
        assert_eq!(ScanError::from(NotFound).classification(), "not_found");
        assert_eq!(
            ScanError::from(CaptureError::Failure("no device".into())),
            ScanError::CaptureFailure("no device".into())
        );
        assert_eq!(ScanError::Busy.classification(), "busy");
        assert_eq!(ScanError::Cancelled.classification(), "cancelled");
    }

    #[test]
    fn test_permission_denied_falls_back_to_upload() {
        let err = ScanError::from(CaptureError::PermissionDenied);
        assert_eq!(err.classification(), "permission_denied");
        assert_eq!(err.fallback_mode(), Some(ScanMode::Upload));
        assert_eq!(ScanError::CaptureFailure("x".into()).fallback_mode(), None);
    }
}
