//! Scan attempts end to end: acquire, decode, normalize, assess.

pub mod error;
pub mod orchestrator;
pub mod source;

use serde::{Deserialize, Serialize};

pub use error::ScanError;
pub use orchestrator::{ScanOrchestrator, ScanOutcome, ScanSource, ScanState};
pub use source::{
    CaptureGuard, CaptureHandle, FrameSequence, FrameSource, decode_named_upload, decode_static,
    is_supported_upload,
};

/// Where frames come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    #[default]
    Camera,
    Upload,
}
