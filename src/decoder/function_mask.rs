use crate::decoder::tables::alignment_pattern_positions;
use crate::models::{BitMatrix, Version};

/// Function module map for one version.
/// `true` = function module (finder, timing, alignment, format, version), `false` = data.
pub struct FunctionMask {
    mask: BitMatrix,
    version: Version,
}

impl FunctionMask {
    pub fn new(version: Version) -> Self {
        let size = version.size();
        let mut mask = BitMatrix::new(size, size);

        // Finders, separators, format areas and the dark module
        Self::mark_rect(&mut mask, 0, 0, 9, 9);
        Self::mark_rect(&mut mask, size - 8, 0, 8, 9);
        Self::mark_rect(&mut mask, 0, size - 8, 9, 8);

        // Timing patterns
        for i in 0..size {
            mask.set(6, i, true);
            mask.set(i, 6, true);
        }

        let align = alignment_pattern_positions(version);
        let last = align.len().saturating_sub(1);
        for (i, &cx) in align.iter().enumerate() {
            for (j, &cy) in align.iter().enumerate() {
                // The three finder corners never hold an alignment pattern
                if (i == 0 && j == 0) || (i == 0 && j == last) || (i == last && j == 0) {
                    continue;
                }
                Self::mark_rect(&mut mask, cx - 2, cy - 2, 5, 5);
            }
        }

        if version.number() >= 7 {
            Self::mark_rect(&mut mask, size - 11, 0, 3, 6);
            Self::mark_rect(&mut mask, 0, size - 11, 6, 3);
        }

        Self { mask, version }
    }

    pub fn size(&self) -> usize {
        self.mask.width()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn is_function(&self, x: usize, y: usize) -> bool {
        self.mask.get(x, y)
    }

    pub fn data_modules_count(&self) -> usize {
        self.size() * self.size() - self.mask.count_dark()
    }

    fn mark_rect(mask: &mut BitMatrix, x: usize, y: usize, w: usize, h: usize) {
        for yy in y..y + h {
            for xx in x..x + w {
                mask.set(xx, yy, true);
            }
        }
    }
}
