use crate::decoder::bitstream::BitstreamExtractor;
use crate::decoder::format::FormatInfo;
use crate::decoder::function_mask::FunctionMask;
use crate::decoder::reed_solomon::ReedSolomonEncoder;
use crate::decoder::tables::{BlockLayout, alignment_pattern_positions};
use crate::decoder::unmask::unmask;
use crate::decoder::version::VersionInfo;
use crate::models::{BitMatrix, ECLevel, MaskPattern, Version};

const PENALTY_N1: u32 = 3;
const PENALTY_N2: u32 = 3;
const PENALTY_N3: u32 = 40;
const PENALTY_N4: u32 = 10;

/// Split data into blocks, append each block's ECC, and interleave
pub(crate) fn interleave_with_ecc(data: &[u8], version: Version, ec_level: ECLevel) -> Vec<u8> {
    let layout = BlockLayout::new(version, ec_level);
    let rs = ReedSolomonEncoder::new(layout.ecc_per_block);

    let mut blocks: Vec<(&[u8], Vec<u8>)> = Vec::with_capacity(layout.num_blocks);
    let mut offset = 0;
    for b in 0..layout.num_blocks {
        let len = layout.data_len(b);
        let end = (offset + len).min(data.len());
        let block = &data[offset.min(end)..end];
        blocks.push((block, rs.ecc(block)));
        offset += len;
    }

    let mut out = Vec::with_capacity(layout.total_codewords());
    for i in 0..=layout.short_data_len {
        for (block, _) in &blocks {
            if let Some(&byte) = block.get(i) {
                out.push(byte);
            }
        }
    }
    for i in 0..layout.ecc_per_block {
        for (_, ecc) in &blocks {
            if let Some(&byte) = ecc.get(i) {
                out.push(byte);
            }
        }
    }
    out
}

/// Finders, separators, timing, alignment and version blocks. Format
/// information is written per mask.
pub(crate) fn draw_function_patterns(version: Version) -> BitMatrix {
    let size = version.size();
    let mut matrix = BitMatrix::new(size, size);

    for (cx, cy) in [(3, 3), (size - 4, 3), (3, size - 4)] {
        for dy in 0..7usize {
            for dx in 0..7usize {
                let ring = dx.abs_diff(3).max(dy.abs_diff(3));
                matrix.set(cx + dx - 3, cy + dy - 3, ring != 2);
            }
        }
    }

    for i in 8..size - 8 {
        matrix.set(i, 6, i % 2 == 0);
        matrix.set(6, i, i % 2 == 0);
    }

    let positions = alignment_pattern_positions(version);
    let last = positions.len().saturating_sub(1);
    for (i, &cx) in positions.iter().enumerate() {
        for (j, &cy) in positions.iter().enumerate() {
            if (i == 0 && j == 0) || (i == 0 && j == last) || (i == last && j == 0) {
                continue;
            }
            for dy in 0..5usize {
                for dx in 0..5usize {
                    let ring = dx.abs_diff(2).max(dy.abs_diff(2));
                    matrix.set(cx + dx - 2, cy + dy - 2, ring != 1);
                }
            }
        }
    }

    VersionInfo::write(version, &mut matrix);
    matrix
}

/// Place codewords along the zigzag; remainder bits stay light
pub(crate) fn place_codewords(matrix: &mut BitMatrix, func: &FunctionMask, codewords: &[u8]) {
    let positions = BitstreamExtractor::data_positions(func);
    let bits = codewords
        .iter()
        .flat_map(|&byte| (0..8).rev().map(move |i| (byte >> i) & 1 == 1));
    for (&(x, y), bit) in positions.iter().zip(bits) {
        matrix.set(x, y, bit);
    }
}

/// Apply a mask and its format information to an unmasked symbol
pub(crate) fn apply_mask(
    unmasked: &BitMatrix,
    func: &FunctionMask,
    ec_level: ECLevel,
    mask: MaskPattern,
) -> BitMatrix {
    let mut masked = unmasked.clone();
    unmask(&mut masked, mask, func);
    FormatInfo::new(ec_level, mask).write(&mut masked);
    masked
}

/// Mask with the lowest penalty, first one on ties
pub(crate) fn choose_mask(
    unmasked: &BitMatrix,
    func: &FunctionMask,
    ec_level: ECLevel,
) -> (MaskPattern, BitMatrix) {
    let mut best: Option<(u32, MaskPattern, BitMatrix)> = None;
    for mask in MaskPattern::ALL {
        let candidate = apply_mask(unmasked, func, ec_level, mask);
        let score = penalty_score(&candidate);
        tracing::trace!(mask = mask.bits(), score, "mask penalty");
        if best.as_ref().is_none_or(|(s, _, _)| score < *s) {
            best = Some((score, mask, candidate));
        }
    }
    match best {
        Some((_, mask, matrix)) => (mask, matrix),
        None => (
            MaskPattern::Pattern0,
            apply_mask(unmasked, func, ec_level, MaskPattern::Pattern0),
        ),
    }
}

/// Standard four-rule penalty (runs, 2x2 blocks, finder-like runs, balance)
pub(crate) fn penalty_score(matrix: &BitMatrix) -> u32 {
    let size = matrix.width();
    let mut score = 0;

    for horizontal in [true, false] {
        for a in 0..size {
            let line: Vec<bool> = (0..size)
                .map(|b| if horizontal { matrix.get(b, a) } else { matrix.get(a, b) })
                .collect();
            score += line_run_penalty(&line) + line_finder_penalty(&line);
        }
    }

    for y in 0..size.saturating_sub(1) {
        for x in 0..size.saturating_sub(1) {
            let c = matrix.get(x, y);
            if c == matrix.get(x + 1, y) && c == matrix.get(x, y + 1) && c == matrix.get(x + 1, y + 1) {
                score += PENALTY_N2;
            }
        }
    }

    let total = (size * size) as u32;
    let dark = matrix.count_dark() as u32;
    // Deviation from 50% in whole 5% steps
    let k = ((dark * 20).abs_diff(total * 10) + total - 1) / total;
    score + k.saturating_sub(1) * PENALTY_N4
}

fn line_run_penalty(line: &[bool]) -> u32 {
    let mut score = 0;
    let mut run = 0;
    let mut color = None;
    for &module in line.iter() {
        if Some(module) == color {
            run += 1;
        } else {
            if run >= 5 {
                score += PENALTY_N1 + (run - 5);
            }
            color = Some(module);
            run = 1;
        }
    }
    if run >= 5 {
        score += PENALTY_N1 + (run - 5);
    }
    score
}

/// 1:1:3:1:1 dark-light pattern with four light modules on either side
fn line_finder_penalty(line: &[bool]) -> u32 {
    const CORE: [bool; 7] = [true, false, true, true, true, false, true];
    let n = line.len() as isize;
    let light = |i: isize| i < 0 || i >= n || !line[i as usize];
    let mut score = 0;
    for start in 0..n.saturating_sub(6) + 1 {
        let matches = CORE
            .iter()
            .enumerate()
            .all(|(k, &dark)| start + (k as isize) < n && line[(start + k as isize) as usize] == dark);
        if !matches {
            continue;
        }
        let before = (1..=4).all(|d| light(start - d));
        let after = (0..4).all(|d| light(start + 7 + d));
        if before || after {
            score += PENALTY_N3;
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_patterns_match_mask() {
        for number in [1u8, 2, 7, 14] {
            let version = Version::new(number).unwrap();
            let func = FunctionMask::new(version);
            let matrix = draw_function_patterns(version);
            // Nothing outside the function area is drawn
            for y in 0..version.size() {
                for x in 0..version.size() {
                    if matrix.get(x, y) {
                        assert!(func.is_function(x, y), "v{number} ({x},{y})");
                    }
                }
            }
        }
    }

    #[test]
    fn test_interleave_two_blocks() {
        // 5-Q: two blocks of 15 and two of 16 data codewords, 18 ECC each
        let version = Version::new(5).unwrap();
        let layout = BlockLayout::new(version, ECLevel::Q);
        let data: Vec<u8> = (0..layout.total_data_codewords() as u32).map(|i| i as u8).collect();
        let out = interleave_with_ecc(&data, version, ECLevel::Q);
        assert_eq!(out.len(), layout.total_codewords());
        assert_eq!(&out[..4], &[0, 15, 30, 46]);
        // Last data codeword comes from the final long block
        assert_eq!(out[layout.total_data_codewords() - 1], 61);
    }

    #[test]
    fn test_run_penalty() {
        let line = [true; 7];
        assert_eq!(line_run_penalty(&line), PENALTY_N1 + 2);
        let alternating: Vec<bool> = (0..10).map(|i| i % 2 == 0).collect();
        assert_eq!(line_run_penalty(&alternating), 0);
    }

    #[test]
    fn test_finder_like_penalty() {
        let mut line = vec![false; 4];
        line.extend_from_slice(&[true, false, true, true, true, false, true]);
        assert_eq!(line_finder_penalty(&line), PENALTY_N3);
        let dense = [true, false, true, true, true, false, true, true, true, true, true];
        assert_eq!(line_finder_penalty(&dense[..]), PENALTY_N3);
    }
}
