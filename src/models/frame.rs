use thiserror::Error;

/// Reasons a pixel buffer cannot become a [`FrameBuffer`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Width or height is zero
    #[error("frame dimensions must be non-zero (got {width}x{height})")]
    EmptyDimensions {
        /// Requested width
        width: usize,
        /// Requested height
        height: usize,
    },
    /// Byte count does not match `width * height * 4`
    #[error("expected {expected} RGBA bytes, got {actual}")]
    LengthMismatch {
        /// Bytes required by the dimensions
        expected: usize,
        /// Bytes supplied
        actual: usize,
    },
}

/// An RGBA frame owned by a single decode call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Bytes per pixel
    pub const CHANNELS: usize = 4;

    /// Validate dimensions and wrap RGBA bytes
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyDimensions { width, height });
        }
        let expected = width
            .checked_mul(height)
            .and_then(|px| px.checked_mul(Self::CHANNELS))
            .ok_or(FrameError::LengthMismatch {
                expected: usize::MAX,
                actual: data.len(),
            })?;
        if data.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Expand tightly packed 8-bit luma into RGBA
    pub fn from_luma(width: usize, height: usize, luma: &[u8]) -> Result<Self, FrameError> {
        let mut data = Vec::with_capacity(luma.len() * Self::CHANNELS);
        for &l in luma {
            data.extend_from_slice(&[l, l, l, 255]);
        }
        Self::new(width, height, data)
    }

    /// Width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw RGBA bytes, row-major
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_dimensions() {
        assert_eq!(
            FrameBuffer::new(0, 4, vec![]),
            Err(FrameError::EmptyDimensions {
                width: 0,
                height: 4
            })
        );
        assert_eq!(
            FrameBuffer::new(2, 2, vec![0; 15]),
            Err(FrameError::LengthMismatch {
                expected: 16,
                actual: 15
            })
        );
    }

    #[test]
    fn test_from_luma() {
        let frame = FrameBuffer::from_luma(2, 1, &[10, 200]).unwrap();
        assert_eq!(frame.data(), &[10, 10, 10, 255, 200, 200, 200, 255]);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 1);
    }
}
