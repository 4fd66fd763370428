//! QR symbol generation, used for round-trip checks and `qrtool render`.
//!
//! A single segment in the most compact mode is placed in the smallest
//! version that fits, followed by terminator and pad codewords.

mod placement;
mod segment;

use crate::decoder::function_mask::FunctionMask;
use crate::models::{BitMatrix, ECLevel, FrameBuffer, FrameError, MaskPattern, Version};
use segment::Segment;
use thiserror::Error;

/// Reasons a text cannot be encoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Nothing to encode
    #[error("cannot encode an empty payload")]
    Empty,
    /// Exceeds version 40 capacity at the requested level
    #[error("payload of {len} bytes does not fit any version at level {ec_level:?}")]
    TooLong {
        /// Payload length in bytes
        len: usize,
        /// Requested error correction level
        ec_level: ECLevel,
    },
    /// Rendered image has invalid dimensions
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// A finished symbol, one module per matrix cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSymbol {
    pub modules: BitMatrix,
    pub version: Version,
    pub ec_level: ECLevel,
    pub mask: MaskPattern,
}

impl EncodedSymbol {
    /// Side length in modules
    pub fn size(&self) -> usize {
        self.modules.width()
    }
}

/// Encode `text` choosing the mask with the lowest penalty
pub fn encode_text(text: &str, ec_level: ECLevel) -> Result<EncodedSymbol, EncodeError> {
    encode_text_with_mask(text, ec_level, None)
}

/// Encode `text`, optionally forcing a mask pattern
pub fn encode_text_with_mask(
    text: &str,
    ec_level: ECLevel,
    mask: Option<MaskPattern>,
) -> Result<EncodedSymbol, EncodeError> {
    if text.is_empty() {
        return Err(EncodeError::Empty);
    }
    let too_long = || EncodeError::TooLong {
        len: text.len(),
        ec_level,
    };

    let segment = Segment::for_text(text);
    let version = segment.smallest_version(ec_level).ok_or_else(too_long)?;
    let data = segment
        .data_codewords(version, ec_level)
        .ok_or_else(too_long)?;
    let codewords = placement::interleave_with_ecc(&data, version, ec_level);

    let func = FunctionMask::new(version);
    let mut unmasked = placement::draw_function_patterns(version);
    placement::place_codewords(&mut unmasked, &func, &codewords);

    let (mask, modules) = match mask {
        Some(mask) => (mask, placement::apply_mask(&unmasked, &func, ec_level, mask)),
        None => placement::choose_mask(&unmasked, &func, ec_level),
    };

    tracing::debug!(
        %version,
        ?ec_level,
        mask = mask.bits(),
        mode = ?segment.mode,
        "symbol encoded"
    );

    Ok(EncodedSymbol {
        modules,
        version,
        ec_level,
        mask,
    })
}

/// Rasterize a symbol: `scale` pixels per module and a light border of
/// `quiet_zone` modules (4 by convention)
pub fn render_rgba(
    symbol: &EncodedSymbol,
    scale: usize,
    quiet_zone: usize,
) -> Result<FrameBuffer, EncodeError> {
    let scale = scale.max(1);
    let modules = symbol.size() + 2 * quiet_zone;
    let side = modules * scale;

    let mut data = Vec::with_capacity(side * side * FrameBuffer::CHANNELS);
    for y in 0..side {
        for x in 0..side {
            let mx = (x / scale).checked_sub(quiet_zone);
            let my = (y / scale).checked_sub(quiet_zone);
            let dark = matches!((mx, my), (Some(mx), Some(my)) if symbol.modules.get(mx, my));
            let luma = if dark { 0 } else { 255 };
            data.extend_from_slice(&[luma, luma, luma, 255]);
        }
    }
    Ok(FrameBuffer::new(side, side, data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::qr_decoder::QrDecoder;

    #[test]
    fn test_matrix_round_trip_all_levels() {
        for ec_level in ECLevel::ALL {
            let symbol = encode_text("HELLO WORLD", ec_level).unwrap();
            let decoded = QrDecoder::decode_matrix(&symbol.modules).unwrap();
            assert_eq!(decoded.text, "HELLO WORLD");
            assert_eq!(decoded.ec_level, ec_level);
            assert_eq!(decoded.mask, symbol.mask);
        }
    }

    #[test]
    fn test_fixed_mask_is_honoured() {
        for mask in MaskPattern::ALL {
            let symbol = encode_text_with_mask("12345", ECLevel::M, Some(mask)).unwrap();
            assert_eq!(symbol.mask, mask);
            let decoded = QrDecoder::decode_matrix(&symbol.modules).unwrap();
            assert_eq!(decoded.text, "12345");
            assert_eq!(decoded.mask, mask);
        }
    }

    #[test]
    fn test_version_info_path() {
        let text = "a".repeat(200);
        let symbol = encode_text(&text, ECLevel::M).unwrap();
        assert!(symbol.version.number() >= 7);
        let decoded = QrDecoder::decode_matrix(&symbol.modules).unwrap();
        assert_eq!(decoded.text, text);
        assert_eq!(decoded.version, symbol.version);
    }

    #[test]
    fn test_errors() {
        assert_eq!(encode_text("", ECLevel::L), Err(EncodeError::Empty));
        let huge = "x".repeat(4000);
        assert!(matches!(
            encode_text(&huge, ECLevel::L),
            Err(EncodeError::TooLong { len: 4000, .. })
        ));
    }

    #[test]
    fn test_render_dimensions() {
        let symbol = encode_text("1", ECLevel::L).unwrap();
        let frame = render_rgba(&symbol, 3, 4).unwrap();
        assert_eq!(frame.width(), (21 + 8) * 3);
        assert_eq!(frame.data()[0], 255);
        // First finder module
        let offset = ((4 * 3) * frame.width() + 4 * 3) * 4;
        assert_eq!(frame.data()[offset], 0);
    }

    #[test]
    fn test_empty_byte_segment_is_not_a_payload() {
        // Byte mode, count 0, terminator, then padding to 16 codewords (1-M)
        let mut data = vec![0x40, 0x00, 0x00];
        let mut pad = [0xEC, 0x11].into_iter().cycle();
        while data.len() < 16 {
            data.extend(pad.next());
        }
        let version = Version::MIN;
        let codewords = placement::interleave_with_ecc(&data, version, ECLevel::M);
        let func = FunctionMask::new(version);
        let mut unmasked = placement::draw_function_patterns(version);
        placement::place_codewords(&mut unmasked, &func, &codewords);
        let modules = placement::apply_mask(&unmasked, &func, ECLevel::M, MaskPattern::Pattern2);

        assert!(QrDecoder::decode_matrix(&modules).is_none());
    }
}
