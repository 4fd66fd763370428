use crate::decoder::modes::{AlphanumericDecoder, Mode};
use crate::decoder::tables::num_data_codewords;
use crate::models::{ECLevel, Version};

/// MSB-first bit accumulator
#[derive(Debug, Default, Clone)]
pub(crate) struct BitBuffer {
    bits: Vec<bool>,
}

impl BitBuffer {
    pub fn push(&mut self, value: u32, count: usize) {
        for i in (0..count).rev() {
            self.bits.push((value >> i) & 1 == 1);
        }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn extend(&mut self, other: &BitBuffer) {
        self.bits.extend_from_slice(&other.bits);
    }

    /// Pack into bytes; a partial final byte is zero-filled
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bits
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .chain(std::iter::repeat(&false))
                    .take(8)
                    .fold(0u8, |acc, &b| (acc << 1) | b as u8)
            })
            .collect()
    }
}

/// A single-mode segment: mode, character count and payload bits
#[derive(Debug, Clone)]
pub(crate) struct Segment {
    pub mode: Mode,
    pub char_count: usize,
    pub data: BitBuffer,
}

impl Segment {
    /// Most compact of numeric, alphanumeric and byte for the whole text
    pub fn for_text(text: &str) -> Self {
        if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            Self::numeric(text)
        } else if !text.is_empty() && text.chars().all(|c| AlphanumericDecoder::index_of(c).is_some()) {
            Self::alphanumeric(text)
        } else {
            Self::bytes(text.as_bytes())
        }
    }

    fn numeric(digits: &str) -> Self {
        let mut data = BitBuffer::default();
        for chunk in digits.as_bytes().chunks(3) {
            let value = chunk.iter().fold(0u32, |acc, &d| acc * 10 + (d - b'0') as u32);
            data.push(value, chunk.len() * 3 + 1);
        }
        Self {
            mode: Mode::Numeric,
            char_count: digits.len(),
            data,
        }
    }

    fn alphanumeric(text: &str) -> Self {
        let indices: Vec<u32> = text
            .chars()
            .filter_map(AlphanumericDecoder::index_of)
            .map(|i| i as u32)
            .collect();
        let mut data = BitBuffer::default();
        for pair in indices.chunks(2) {
            match *pair {
                [a, b] => data.push(a * 45 + b, 11),
                [a] => data.push(a, 6),
                _ => {}
            }
        }
        Self {
            mode: Mode::Alphanumeric,
            char_count: indices.len(),
            data,
        }
    }

    fn bytes(bytes: &[u8]) -> Self {
        let mut data = BitBuffer::default();
        for &b in bytes {
            data.push(b as u32, 8);
        }
        Self {
            mode: Mode::Byte,
            char_count: bytes.len(),
            data,
        }
    }

    /// Header plus payload length at `version`, or `None` when the character
    /// count does not fit its field
    pub fn encoded_len(&self, version: Version) -> Option<usize> {
        let count_bits = self.mode.char_count_bits(version);
        if self.char_count >= 1usize << count_bits {
            return None;
        }
        Some(4 + count_bits + self.data.len())
    }

    /// Smallest version whose data capacity holds this segment
    pub fn smallest_version(&self, ec_level: ECLevel) -> Option<Version> {
        (Version::MIN.number()..=Version::MAX.number())
            .filter_map(Version::new)
            .find(|&version| {
                self.encoded_len(version)
                    .is_some_and(|len| len <= num_data_codewords(version, ec_level) * 8)
            })
    }

    /// Data codewords: header, payload, terminator, bit padding and pad bytes
    pub fn data_codewords(&self, version: Version, ec_level: ECLevel) -> Option<Vec<u8>> {
        let capacity_bits = num_data_codewords(version, ec_level) * 8;
        let count_bits = self.mode.char_count_bits(version);

        let mut buffer = BitBuffer::default();
        buffer.push(self.mode.indicator() as u32, 4);
        buffer.push(self.char_count as u32, count_bits);
        buffer.extend(&self.data);
        if buffer.len() > capacity_bits {
            return None;
        }

        let terminator = (capacity_bits - buffer.len()).min(4);
        buffer.push(0, terminator);
        let mut codewords = buffer.to_bytes();
        let capacity = capacity_bits / 8;
        for pad in [0xEC, 0x11].into_iter().cycle() {
            if codewords.len() >= capacity {
                break;
            }
            codewords.push(pad);
        }
        Some(codewords)
    }
}
