use crate::decoder::function_mask::FunctionMask;
use crate::models::BitMatrix;

/// Zigzag traversal of the data region
pub struct BitstreamExtractor;

impl BitstreamExtractor {
    /// Data module coordinates `(x, y)` in codeword bit order.
    ///
    /// Column pairs are walked right to left starting upward; the vertical
    /// timing column is skipped without changing direction.
    pub fn data_positions(func: &FunctionMask) -> Vec<(usize, usize)> {
        let size = func.size();
        let mut positions = Vec::with_capacity(func.data_modules_count());
        let mut right = size as isize - 1;
        let mut upward = true;

        while right >= 1 {
            if right == 6 {
                right = 5;
            }
            for step in 0..size {
                let y = if upward { size - 1 - step } else { step };
                for dx in 0..2 {
                    let x = (right - dx) as usize;
                    if !func.is_function(x, y) {
                        positions.push((x, y));
                    }
                }
            }
            upward = !upward;
            right -= 2;
        }
        positions
    }

    /// Read data bits from an unmasked matrix
    pub fn extract(matrix: &BitMatrix, func: &FunctionMask) -> Vec<bool> {
        Self::data_positions(func)
            .into_iter()
            .map(|(x, y)| matrix.get(x, y))
            .collect()
    }

    /// Pack bits MSB-first into codewords, dropping trailing remainder bits
    pub fn to_codewords(bits: &[bool]) -> Vec<u8> {
        bits.chunks_exact(8)
            .map(|chunk| chunk.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Version;

    #[test]
    fn test_traversal_order_v1() {
        let func = FunctionMask::new(Version::new(1).unwrap());
        let positions = BitstreamExtractor::data_positions(&func);
        assert_eq!(positions.len(), 208);
        assert_eq!(&positions[..4], &[(20, 20), (19, 20), (20, 19), (19, 19)]);
        // Column 6 is never visited
        assert!(positions.iter().all(|&(x, _)| x != 6));
    }

    #[test]
    fn test_codeword_packing() {
        let bits = [true, false, false, false, false, false, false, true, true];
        assert_eq!(BitstreamExtractor::to_codewords(&bits), vec![0x81]);
    }
}
