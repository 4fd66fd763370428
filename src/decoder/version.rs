use crate::models::{BitMatrix, Version};

const VERSION_GENERATOR: u32 = 0x1F25;

/// Largest Hamming distance still accepted as a correctable read
pub const MAX_VERSION_DISTANCE: u32 = 3;

/// 18-bit version information (versions 7-40)
pub struct VersionInfo;

impl VersionInfo {
    /// BCH(18,6) codeword for a version number
    pub fn encode(version: u8) -> u32 {
        let data = version as u32;
        let mut rem = data;
        for _ in 0..12 {
            rem = (rem << 1) ^ ((rem >> 11) * VERSION_GENERATOR);
        }
        (data << 12) | rem
    }

    /// Nearest version 7-40 to `bits`, with its Hamming distance
    pub fn decode_bits(bits: u32) -> Option<(Version, u32)> {
        (7..=40u8)
            .map(|v| (v, (Self::encode(v) ^ bits).count_ones()))
            .min_by_key(|&(_, distance)| distance)
            .filter(|&(_, distance)| distance <= MAX_VERSION_DISTANCE)
            .and_then(|(v, distance)| Version::new(v).map(|version| (version, distance)))
    }

    /// Read both version blocks; `None` for symbols smaller than version 7
    pub fn read(matrix: &BitMatrix) -> Option<Version> {
        let size = matrix.width();
        if size < 45 {
            return None;
        }

        let mut top_right = 0u32;
        let mut bottom_left = 0u32;
        for i in 0..18 {
            let (a, b) = Self::module_offset(size, i);
            top_right |= (matrix.get(a, b) as u32) << i;
            bottom_left |= (matrix.get(b, a) as u32) << i;
        }

        [top_right, bottom_left]
            .into_iter()
            .filter_map(Self::decode_bits)
            .min_by_key(|&(_, distance)| distance)
            .map(|(version, _)| version)
    }

    /// Draw both version blocks for versions 7 and above
    pub fn write(version: Version, matrix: &mut BitMatrix) {
        if version.number() < 7 {
            return;
        }
        let size = version.size();
        let bits = Self::encode(version.number());
        for i in 0..18 {
            let dark = (bits >> i) & 1 == 1;
            let (a, b) = Self::module_offset(size, i);
            matrix.set(a, b, dark);
            matrix.set(b, a, dark);
        }
    }

    /// Top-right `(x, y)` of bit `i`; the bottom-left copy is transposed
    fn module_offset(size: usize, i: usize) -> (usize, usize) {
        (size - 11 + i % 3, i / 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_codewords() {
        assert_eq!(VersionInfo::encode(7), 0x07C94);
        assert_eq!(VersionInfo::encode(40), 0x28C69);
    }

    #[test]
    fn test_corrects_three_bit_errors() {
        let damaged = VersionInfo::encode(21) ^ 0b10_0000_0001_0000_0001;
        assert_eq!(
            VersionInfo::decode_bits(damaged),
            Some((Version::new(21).unwrap(), 3))
        );
    }

    #[test]
    fn test_write_then_read() {
        let version = Version::new(12).unwrap();
        let mut matrix = BitMatrix::new(version.size(), version.size());
        VersionInfo::write(version, &mut matrix);
        assert_eq!(VersionInfo::read(&matrix), Some(version));
    }

    #[test]
    fn test_small_symbols_have_no_version_block() {
        assert_eq!(VersionInfo::read(&BitMatrix::new(41, 41)), None);
    }
}
