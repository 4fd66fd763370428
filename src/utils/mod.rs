//! Image processing helpers used by the detector and decoder:
//! grayscale conversion, binarization and perspective geometry.

pub mod binarization;
pub mod geometry;
pub mod grayscale;
