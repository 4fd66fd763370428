//! Frame acquisition: live capture sources and uploaded still images.
use crate::error::{CaptureError, StaticImageError};
use crate::models::FrameBuffer;
use std::collections::VecDeque;
use std::path::Path;

/// Upload extensions accepted by name
pub const SUPPORTED_UPLOAD_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Token for one started capture session
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CaptureHandle {
    id: u64,
}

impl CaptureHandle {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// A live frame producer such as a camera.
///
/// `latest_frame` returns only the most recent frame; anything older is
/// dropped by the source. `Ok(None)` means no new frame yet.
pub trait FrameSource: Send {
    fn start(&mut self) -> Result<CaptureHandle, CaptureError>;

    fn latest_frame(&mut self, handle: &CaptureHandle)
    -> Result<Option<FrameBuffer>, CaptureError>;

    fn stop(&mut self, handle: CaptureHandle);
}

/// Scoped capture session. `stop` runs exactly once, on the first of
/// [`CaptureGuard::stop`] or drop.
pub struct CaptureGuard {
    source: Box<dyn FrameSource>,
    handle: Option<CaptureHandle>,
}

impl CaptureGuard {
    pub fn start(mut source: Box<dyn FrameSource>) -> Result<Self, CaptureError> {
        let handle = source.start()?;
        tracing::debug!(handle = handle.id(), "capture started");
        Ok(Self {
            source,
            handle: Some(handle),
        })
    }

    /// Most recent frame, or `None` once stopped
    pub fn latest_frame(&mut self) -> Result<Option<FrameBuffer>, CaptureError> {
        match &self.handle {
            Some(handle) => self.source.latest_frame(handle),
            None => Ok(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::debug!(handle = handle.id(), "capture stopped");
            self.source.stop(handle);
        }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Replays a fixed sequence of frames, one per poll
pub struct FrameSequence {
    frames: VecDeque<FrameBuffer>,
    next_handle: u64,
}

impl FrameSequence {
    pub fn new(frames: impl IntoIterator<Item = FrameBuffer>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            next_handle: 1,
        }
    }
}

impl FrameSource for FrameSequence {
    fn start(&mut self) -> Result<CaptureHandle, CaptureError> {
        let handle = CaptureHandle::new(self.next_handle);
        self.next_handle += 1;
        Ok(handle)
    }

    fn latest_frame(
        &mut self,
        _handle: &CaptureHandle,
    ) -> Result<Option<FrameBuffer>, CaptureError> {
        Ok(self.frames.pop_front())
    }

    fn stop(&mut self, _handle: CaptureHandle) {
        self.frames.clear();
    }
}

/// Whether an upload with this file name is accepted (png, jpg, jpeg)
pub fn is_supported_upload(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_UPLOAD_EXTENSIONS
                .iter()
                .any(|s| ext.eq_ignore_ascii_case(s))
        })
        .unwrap_or(false)
}

/// Decode uploaded image bytes into an RGBA frame; the format is sniffed
pub fn decode_static(image_bytes: &[u8]) -> Result<FrameBuffer, StaticImageError> {
    let image = image::load_from_memory(image_bytes)?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(FrameBuffer::new(
        width as usize,
        height as usize,
        rgba.into_raw(),
    )?)
}

/// [`decode_static`] after checking the upload's file name
pub fn decode_named_upload(
    name: &str,
    image_bytes: &[u8],
) -> Result<FrameBuffer, StaticImageError> {
    if !is_supported_upload(name) {
        return Err(StaticImageError::UnsupportedFormat(name.to_string()));
    }
    decode_static(image_bytes)
}
