pub mod frame;
pub mod matrix;
pub mod point;
pub mod qr_code;

pub use frame::{FrameBuffer, FrameError};
pub use matrix::BitMatrix;
pub use point::Point;
pub use qr_code::{DecodedPayload, ECLevel, MaskPattern, Version};
