use crate::models::{BitMatrix, Point};

/// Finder-region mismatches tolerated for an orientation candidate
const MAX_FINDER_MISMATCH: usize = 10;

/// How a sampled grid was turned to put the finders at top-left, top-right
/// and bottom-left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) struct Orientation {
    /// Clockwise quarter turns applied after the optional transpose
    pub quarter_turns: u8,
    /// Grid was transposed first (mirrored symbol)
    pub mirrored: bool,
}

impl Orientation {
    /// Map a continuous point in the oriented grid back into the sampled grid
    pub fn to_sampled(&self, p: Point, n: f32) -> Point {
        let mut q = p;
        for _ in 0..self.quarter_turns {
            q = Point::new(q.y, n - q.x);
        }
        if self.mirrored {
            q = Point::new(q.y, q.x);
        }
        q
    }
}

pub(super) fn rotate90(matrix: &BitMatrix) -> BitMatrix {
    let n = matrix.width();
    let mut out = BitMatrix::new(n, n);
    for y in 0..n {
        for x in 0..n {
            if matrix.get(x, y) {
                out.set(n - 1 - y, x, true);
            }
        }
    }
    out
}

pub(super) fn transpose(matrix: &BitMatrix) -> BitMatrix {
    let n = matrix.width();
    let mut out = BitMatrix::new(n, n);
    for y in 0..n {
        for x in 0..n {
            if matrix.get(x, y) {
                out.set(y, x, true);
            }
        }
    }
    out
}

/// Mismatches against the three finder patterns and their separators
pub(super) fn finder_mismatch(matrix: &BitMatrix) -> usize {
    let n = matrix.width();
    if n < 21 {
        return usize::MAX;
    }
    let corners = [(3usize, 3usize), (n - 4, 3), (3, n - 4)];
    let mut mismatches = 0;
    for (cx, cy) in corners {
        for y in cy.saturating_sub(3)..=(cy + 3) {
            for x in cx.saturating_sub(3)..=(cx + 3) {
                let dx = x.abs_diff(cx);
                let dy = y.abs_diff(cy);
                let ring = dx.max(dy);
                let expected = ring != 2;
                if matrix.get(x, y) != expected {
                    mismatches += 1;
                }
            }
        }
    }
    mismatches
}

/// Oriented variants of a sampled grid whose finder regions look right,
/// best match first; unmirrored turns win ties
pub(super) fn candidate_orientations(matrix: &BitMatrix) -> Vec<(Orientation, BitMatrix)> {
    let mut candidates = Vec::with_capacity(8);
    for mirrored in [false, true] {
        let mut current = if mirrored {
            transpose(matrix)
        } else {
            matrix.clone()
        };
        for quarter_turns in 0..4u8 {
            let mismatch = finder_mismatch(&current);
            if mismatch <= MAX_FINDER_MISMATCH {
                let orientation = Orientation {
                    quarter_turns,
                    mirrored,
                };
                candidates.push((mismatch, orientation, current.clone()));
            }
            current = rotate90(&current);
        }
    }

    candidates.sort_by_key(|(mismatch, orientation, _)| (*mismatch, orientation.mirrored));
    candidates
        .into_iter()
        .map(|(_, orientation, grid)| (orientation, grid))
        .collect()
}
