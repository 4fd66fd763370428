//! QR symbol decoding after detection:
//! - Format and version information (BCH)
//! - Unmasking and bitstream extraction
//! - Reed-Solomon error correction
//! - Segment decoding (numeric, alphanumeric, byte, kanji, ECI)

/// Bitstream extraction from QR matrix
pub mod bitstream;
pub mod config;
/// Format information (mask pattern, EC level)
pub mod format;
/// Function module mask (finder/timing/format/alignment/version)
pub mod function_mask;
/// Segment mode decoders
pub mod modes;
/// Per-symbol decoding: sampling, orientation, payload
pub mod qr_decoder;
/// Reed-Solomon error correction
pub mod reed_solomon;
/// Capacity and block tables
pub mod tables;
/// Mask removal
pub mod unmask;
/// Version information (versions 7-40)
pub mod version;
