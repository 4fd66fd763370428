//! Segment modes and their per-mode decoders.
//!
//! - Numeric: digits, 3 per 10 bits
//! - Alphanumeric: 45-character set, 2 per 11 bits
//! - Byte: raw 8-bit data
//! - Kanji: 13-bit packed Shift_JIS

use crate::models::Version;

pub mod alphanumeric;
pub mod byte;
pub mod kanji;
pub mod numeric;

pub use alphanumeric::AlphanumericDecoder;
pub use byte::ByteDecoder;
pub use kanji::KanjiDecoder;
pub use numeric::NumericDecoder;

/// 4-bit mode indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Terminator,
    Numeric,
    Alphanumeric,
    StructuredAppend,
    Byte,
    Fnc1First,
    Eci,
    Kanji,
    Fnc1Second,
}

impl Mode {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b0000 => Some(Mode::Terminator),
            0b0001 => Some(Mode::Numeric),
            0b0010 => Some(Mode::Alphanumeric),
            0b0011 => Some(Mode::StructuredAppend),
            0b0100 => Some(Mode::Byte),
            0b0101 => Some(Mode::Fnc1First),
            0b0111 => Some(Mode::Eci),
            0b1000 => Some(Mode::Kanji),
            0b1001 => Some(Mode::Fnc1Second),
            _ => None,
        }
    }

    pub fn indicator(&self) -> u8 {
        match self {
            Mode::Terminator => 0b0000,
            Mode::Numeric => 0b0001,
            Mode::Alphanumeric => 0b0010,
            Mode::StructuredAppend => 0b0011,
            Mode::Byte => 0b0100,
            Mode::Fnc1First => 0b0101,
            Mode::Eci => 0b0111,
            Mode::Kanji => 0b1000,
            Mode::Fnc1Second => 0b1001,
        }
    }

    /// Width of the character count field; zero for modes without one
    pub fn char_count_bits(&self, version: Version) -> usize {
        let tier = match version.number() {
            1..=9 => 0,
            10..=26 => 1,
            _ => 2,
        };
        match self {
            Mode::Numeric => [10, 12, 14][tier],
            Mode::Alphanumeric => [9, 11, 13][tier],
            Mode::Byte => [8, 16, 16][tier],
            Mode::Kanji => [8, 10, 12][tier],
            _ => 0,
        }
    }
}

/// MSB-first reader over data codewords
pub struct BitReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.offset)
    }

    /// Read `n` (at most 32) bits as an unsigned value
    pub fn read_bits(&mut self, n: usize) -> Option<u32> {
        if n > 32 || n > self.remaining() {
            return None;
        }
        let mut value = 0u32;
        for _ in 0..n {
            let byte = self.data[self.offset / 8];
            let bit = (byte >> (7 - self.offset % 8)) & 1;
            value = (value << 1) | bit as u32;
            self.offset += 1;
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_count_bits_by_tier() {
        let v = |n| Version::new(n).unwrap();
        assert_eq!(Mode::Numeric.char_count_bits(v(9)), 10);
        assert_eq!(Mode::Alphanumeric.char_count_bits(v(10)), 11);
        assert_eq!(Mode::Byte.char_count_bits(v(26)), 16);
        assert_eq!(Mode::Kanji.char_count_bits(v(27)), 12);
        assert_eq!(Mode::Eci.char_count_bits(v(1)), 0);
    }

    #[test]
    fn test_bit_reader() {
        let data = [0b1010_0000, 0xFF];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(3), Some(0b101));
        assert_eq!(reader.remaining(), 13);
        assert_eq!(reader.read_bits(9), Some(0b0_0000_1111));
        assert_eq!(reader.read_bits(5), None);
        assert_eq!(reader.read_bits(4), Some(0xF));
    }

    #[test]
    fn test_mode_indicator_roundtrip() {
        for bits in 0..16u8 {
            if let Some(mode) = Mode::from_bits(bits) {
                assert_eq!(mode.indicator(), bits);
            }
        }
        assert_eq!(Mode::from_bits(0b0110), None);
    }
}
