use crate::models::{BitMatrix, ECLevel, MaskPattern};

const FORMAT_GENERATOR: u32 = 0x537;
const FORMAT_XOR_MASK: u16 = 0x5412;

/// Largest Hamming distance still accepted as a correctable read
pub const MAX_FORMAT_DISTANCE: u32 = 3;

/// EC level and mask pattern carried by the 15-bit format information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    pub ec_level: ECLevel,
    pub mask_pattern: MaskPattern,
}

impl FormatInfo {
    pub fn new(ec_level: ECLevel, mask_pattern: MaskPattern) -> Self {
        Self {
            ec_level,
            mask_pattern,
        }
    }

    /// Masked BCH(15,5) codeword for this format
    pub fn encode(&self) -> u16 {
        let data = ((self.ec_level.format_bits() as u32) << 3) | self.mask_pattern.bits() as u32;
        let mut rem = data;
        for _ in 0..10 {
            rem = (rem << 1) ^ ((rem >> 9) * FORMAT_GENERATOR);
        }
        (((data << 10) | rem) as u16) ^ FORMAT_XOR_MASK
    }

    /// Nearest valid format to `bits`, with its Hamming distance
    pub fn decode_bits(bits: u16) -> Option<(Self, u32)> {
        let mut best: Option<(Self, u32)> = None;
        for ec_level in ECLevel::ALL {
            for mask_pattern in MaskPattern::ALL {
                let candidate = Self::new(ec_level, mask_pattern);
                let distance = (candidate.encode() ^ bits).count_ones();
                if best.is_none_or(|(_, d)| distance < d) {
                    best = Some((candidate, distance));
                }
            }
        }
        best.filter(|&(_, distance)| distance <= MAX_FORMAT_DISTANCE)
    }

    /// Read both copies and keep whichever lies closest to a valid codeword
    pub fn read(matrix: &BitMatrix) -> Option<Self> {
        let size = matrix.width();
        if size < 21 {
            return None;
        }
        let [first, second] = Self::module_positions(size);
        let read_copy = |positions: &[(usize, usize); 15]| {
            positions
                .iter()
                .enumerate()
                .fold(0u16, |acc, (i, &(x, y))| acc | ((matrix.get(x, y) as u16) << i))
        };

        let candidates = [read_copy(&first), read_copy(&second)];
        candidates
            .iter()
            .filter_map(|&bits| Self::decode_bits(bits))
            .min_by_key(|&(_, distance)| distance)
            .map(|(info, _)| info)
    }

    /// Draw both copies and the dark module into `matrix`
    pub fn write(&self, matrix: &mut BitMatrix) {
        let size = matrix.width();
        let bits = self.encode();
        for positions in Self::module_positions(size) {
            for (i, &(x, y)) in positions.iter().enumerate() {
                matrix.set(x, y, (bits >> i) & 1 == 1);
            }
        }
        matrix.set(8, size - 8, true);
    }

    /// `(x, y)` of format bit `i` (LSB first) in each of the two copies
    pub fn module_positions(size: usize) -> [[(usize, usize); 15]; 2] {
        let mut first = [(0usize, 0usize); 15];
        let mut second = [(0usize, 0usize); 15];
        for (i, slot) in first.iter_mut().enumerate() {
            *slot = match i {
                0..=5 => (8, i),
                6 => (8, 7),
                7 => (8, 8),
                8 => (7, 8),
                _ => (14 - i, 8),
            };
        }
        for (i, slot) in second.iter_mut().enumerate() {
            *slot = if i < 8 {
                (size - 1 - i, 8)
            } else {
                (8, size - 15 + i)
            };
        }
        [first, second]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_codewords() {
        // M / mask 0 and L / mask 4 from the reference format table
        assert_eq!(
            FormatInfo::new(ECLevel::M, MaskPattern::Pattern0).encode(),
            0x5412
        );
        assert_eq!(
            FormatInfo::new(ECLevel::L, MaskPattern::Pattern4).encode(),
            0b110011000101111
        );
    }

    #[test]
    fn test_corrects_three_bit_errors() {
        let info = FormatInfo::new(ECLevel::Q, MaskPattern::Pattern6);
        let damaged = info.encode() ^ 0b100_0000_0100_0001;
        assert_eq!(FormatInfo::decode_bits(damaged), Some((info, 3)));
    }

    #[test]
    fn test_write_then_read() {
        let mut matrix = BitMatrix::new(25, 25);
        let info = FormatInfo::new(ECLevel::H, MaskPattern::Pattern3);
        info.write(&mut matrix);
        assert!(matrix.get(8, 25 - 8));
        assert_eq!(FormatInfo::read(&matrix), Some(info));
    }

    #[test]
    fn test_falls_back_to_second_copy() {
        let mut matrix = BitMatrix::new(21, 21);
        let info = FormatInfo::new(ECLevel::L, MaskPattern::Pattern2);
        info.write(&mut matrix);
        // Wreck the first copy
        for (x, y) in FormatInfo::module_positions(21)[0].iter().take(8) {
            matrix.toggle(*x, *y);
        }
        assert_eq!(FormatInfo::read(&matrix), Some(info));
    }

    #[test]
    fn test_too_small_matrix() {
        assert_eq!(FormatInfo::read(&BitMatrix::new(10, 10)), None);
    }
}
