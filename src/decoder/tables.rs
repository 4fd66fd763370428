//! Symbol capacity tables for QR Model 2, indexed `[ec_level][version]`.

use crate::models::{ECLevel, Version};

const ECC_CODEWORDS_PER_BLOCK: [[u8; 41]; 4] = [
    [
        0, 7, 10, 15, 20, 26, 18, 20, 24, 30, 18, 20, 24, 26, 30, 22, 24, 28, 30, 28, 28, 28, 28,
        30, 30, 26, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        0, 10, 16, 26, 18, 24, 16, 18, 22, 22, 26, 30, 22, 22, 24, 24, 28, 28, 26, 26, 26, 26, 28,
        28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28,
    ],
    [
        0, 13, 22, 18, 26, 18, 24, 18, 22, 20, 24, 28, 26, 24, 20, 30, 24, 28, 28, 26, 30, 28, 30,
        30, 30, 30, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        0, 17, 28, 22, 16, 22, 28, 26, 26, 24, 28, 24, 28, 22, 24, 24, 30, 28, 28, 26, 28, 30, 24,
        30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
];

const NUM_ERROR_CORRECTION_BLOCKS: [[u8; 41]; 4] = [
    [
        0, 1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4, 4, 6, 6, 6, 6, 7, 8, 8, 9, 9, 10, 12, 12, 12,
        13, 14, 15, 16, 17, 18, 19, 19, 20, 21, 22, 24, 25,
    ],
    [
        0, 1, 1, 1, 2, 2, 4, 4, 4, 5, 5, 5, 8, 9, 9, 10, 10, 11, 13, 14, 16, 17, 17, 18, 20, 21,
        23, 25, 26, 28, 29, 31, 33, 35, 37, 38, 40, 43, 45, 47, 49,
    ],
    [
        0, 1, 1, 2, 2, 4, 4, 6, 6, 8, 8, 8, 10, 12, 16, 12, 17, 16, 18, 21, 20, 23, 23, 25, 27,
        29, 34, 34, 35, 38, 40, 43, 45, 48, 51, 53, 56, 59, 62, 65, 68,
    ],
    [
        0, 1, 1, 2, 4, 4, 4, 5, 6, 8, 8, 11, 11, 16, 16, 18, 16, 19, 21, 25, 25, 25, 34, 30, 32,
        35, 37, 40, 42, 45, 48, 51, 54, 57, 60, 63, 66, 70, 74, 77, 81,
    ],
];

/// Block structure of one (version, EC level) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    /// Total number of RS blocks
    pub num_blocks: usize,
    /// ECC codewords in every block
    pub ecc_per_block: usize,
    /// Number of blocks carrying `short_data_len` data codewords; the rest carry one more
    pub num_short_blocks: usize,
    /// Data codewords in a short block
    pub short_data_len: usize,
}

impl BlockLayout {
    /// Layout for a version and EC level
    pub fn new(version: Version, ec_level: ECLevel) -> Self {
        let v = version.number() as usize;
        let idx = ec_level.ordinal();
        let num_blocks = NUM_ERROR_CORRECTION_BLOCKS[idx][v] as usize;
        let ecc_per_block = ECC_CODEWORDS_PER_BLOCK[idx][v] as usize;
        let raw_codewords = raw_data_modules(version) / 8;
        let num_short_blocks = num_blocks - raw_codewords % num_blocks;
        let short_block_len = raw_codewords / num_blocks;
        Self {
            num_blocks,
            ecc_per_block,
            num_short_blocks,
            short_data_len: short_block_len - ecc_per_block,
        }
    }

    /// Data codewords held by block `index`
    pub fn data_len(&self, index: usize) -> usize {
        if index < self.num_short_blocks {
            self.short_data_len
        } else {
            self.short_data_len + 1
        }
    }

    /// Total data codewords across all blocks
    pub fn total_data_codewords(&self) -> usize {
        self.short_data_len * self.num_blocks + (self.num_blocks - self.num_short_blocks)
    }

    /// Total codewords (data + ECC) in the symbol
    pub fn total_codewords(&self) -> usize {
        self.total_data_codewords() + self.ecc_per_block * self.num_blocks
    }
}

/// Modules available for data and ECC after all function patterns
/// (remainder bits included)
pub fn raw_data_modules(version: Version) -> usize {
    let v = version.number() as usize;
    let mut result = (16 * v + 128) * v + 64;
    if v >= 2 {
        let num_align = v / 7 + 2;
        result -= (25 * num_align - 10) * num_align - 55;
        if v >= 7 {
            result -= 36;
        }
    }
    result
}

/// Data codewords available at a version and EC level
pub fn num_data_codewords(version: Version, ec_level: ECLevel) -> usize {
    BlockLayout::new(version, ec_level).total_data_codewords()
}

/// Center coordinates of alignment patterns along one axis
pub fn alignment_pattern_positions(version: Version) -> Vec<usize> {
    let v = version.number() as usize;
    if v == 1 {
        return Vec::new();
    }
    let num_align = v / 7 + 2;
    let step = if v == 32 {
        26
    } else {
        (v * 4 + num_align * 2 + 1) / (num_align * 2 - 2) * 2
    };
    let size = version.size();
    let mut positions = vec![6usize; num_align];
    let mut pos = size - 7;
    for slot in positions.iter_mut().skip(1).rev() {
        *slot = pos;
        pos = pos.saturating_sub(step);
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(n: u8) -> Version {
        Version::new(n).unwrap()
    }

    #[test]
    fn test_raw_modules() {
        assert_eq!(raw_data_modules(v(1)), 208);
        assert_eq!(raw_data_modules(v(2)), 359);
        assert_eq!(raw_data_modules(v(7)), 1568);
        assert_eq!(raw_data_modules(v(40)), 29648);
    }

    #[test]
    fn test_data_codewords() {
        assert_eq!(num_data_codewords(v(1), ECLevel::L), 19);
        assert_eq!(num_data_codewords(v(1), ECLevel::M), 16);
        assert_eq!(num_data_codewords(v(1), ECLevel::H), 9);
        assert_eq!(num_data_codewords(v(5), ECLevel::Q), 62);
        assert_eq!(num_data_codewords(v(40), ECLevel::L), 2956);
    }

    #[test]
    fn test_block_layout_mixed_lengths() {
        // 5-Q: 2 blocks of 15 and 2 blocks of 16 data codewords
        let layout = BlockLayout::new(v(5), ECLevel::Q);
        assert_eq!(layout.num_blocks, 4);
        assert_eq!(layout.ecc_per_block, 18);
        assert_eq!(layout.num_short_blocks, 2);
        assert_eq!(layout.data_len(0), 15);
        assert_eq!(layout.data_len(3), 16);
        assert_eq!(layout.total_codewords(), 134);
    }

    #[test]
    fn test_alignment_positions() {
        assert!(alignment_pattern_positions(v(1)).is_empty());
        assert_eq!(alignment_pattern_positions(v(2)), vec![6, 18]);
        assert_eq!(alignment_pattern_positions(v(7)), vec![6, 22, 38]);
        assert_eq!(alignment_pattern_positions(v(32)), vec![6, 34, 60, 86, 112, 138]);
        assert_eq!(alignment_pattern_positions(v(40)), vec![6, 30, 58, 86, 114, 142, 170]);
    }
}
