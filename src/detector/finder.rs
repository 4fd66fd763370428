/// Finder pattern detection: 1:1:3:1:1 run scanning per row, refined by
/// vertical and horizontal cross-checks.
use crate::models::{BitMatrix, Point};

/// Smallest accepted pattern width in pixels (2 px per module)
const MIN_PATTERN_WIDTH: usize = 14;

/// At most this many candidates are taken from a single row
const MAX_PATTERNS_PER_ROW: usize = 8;

/// A located finder pattern
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinderPattern {
    pub center: Point,
    pub module_size: f32,
    /// Number of scan rows that confirmed this pattern
    pub count: usize,
}

impl FinderPattern {
    pub fn new(x: f32, y: f32, module_size: f32) -> Self {
        Self {
            center: Point::new(x, y),
            module_size,
            count: 1,
        }
    }

    fn is_near(&self, other: &FinderPattern) -> bool {
        let size_ratio = self.module_size.max(other.module_size)
            / self.module_size.min(other.module_size).max(f32::EPSILON);
        self.center.distance(&other.center) < self.module_size.max(other.module_size) * 2.0
            && size_ratio < 1.5
    }

    fn absorb(&mut self, other: &FinderPattern) {
        let total = (self.count + other.count) as f32;
        let w_self = self.count as f32 / total;
        let w_other = other.count as f32 / total;
        self.center = Point::new(
            self.center.x * w_self + other.center.x * w_other,
            self.center.y * w_self + other.center.y * w_other,
        );
        self.module_size = self.module_size * w_self + other.module_size * w_other;
        self.count += other.count;
    }
}

/// Three finder centers assigned to their symbol corners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinderTriple {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_left: Point,
    pub module_size: f32,
}

pub struct FinderDetector;

impl FinderDetector {
    pub fn detect(matrix: &BitMatrix) -> Vec<FinderPattern> {
        let width = matrix.width();
        let height = matrix.height();
        if width < MIN_PATTERN_WIDTH || height < MIN_PATTERN_WIDTH {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        for y in 0..height {
            if !Self::has_significant_edges(matrix, y, width) {
                continue;
            }
            for candidate in Self::scan_row(matrix, y, width) {
                if let Some(refined) = Self::cross_check(matrix, &candidate) {
                    candidates.push(refined);
                }
            }
        }

        let merged = Self::merge_candidates(candidates);
        let confirmed: Vec<FinderPattern> =
            merged.iter().filter(|p| p.count >= 2).copied().collect();
        let mut patterns = if confirmed.len() >= 3 { confirmed } else { merged };
        patterns.sort_by(|a, b| b.count.cmp(&a.count));
        tracing::trace!(count = patterns.len(), "finder patterns located");
        patterns
    }

    /// Cheap pre-filter: a row needs a few light/dark transitions
    fn has_significant_edges(matrix: &BitMatrix, y: usize, width: usize) -> bool {
        let mut transitions = 0;
        let mut prev_color = matrix.get(0, y);
        for x in (2..width).step_by(2) {
            let color = matrix.get(x, y);
            if color != prev_color {
                transitions += 1;
                prev_color = color;
                if transitions >= 4 {
                    return true;
                }
            }
        }
        false
    }

    fn scan_row(matrix: &BitMatrix, y: usize, width: usize) -> Vec<FinderPattern> {
        let mut candidates = Vec::new();
        let mut runs: [usize; 5] = [0; 5];
        let mut colors: [bool; 5] = [false; 5];
        let mut filled = 0usize;
        let mut run_start = 0usize;
        let mut current_color = matrix.get(0, y);

        for x in 1..=width {
            let color = if x < width {
                matrix.get(x, y)
            } else {
                !current_color
            };
            if color == current_color {
                continue;
            }

            runs.rotate_left(1);
            colors.rotate_left(1);
            runs[4] = x - run_start;
            colors[4] = current_color;
            filled = (filled + 1).min(5);
            run_start = x;
            current_color = color;

            let dark_light_dark =
                colors[0] && !colors[1] && colors[2] && !colors[3] && colors[4];
            if filled == 5 && dark_light_dark && Self::quick_ratio_check(&runs) {
                if let Some(pattern) = Self::check_pattern(&runs, x, y) {
                    candidates.push(pattern);
                    if candidates.len() >= MAX_PATTERNS_PER_ROW {
                        break;
                    }
                }
            }
        }

        candidates
    }

    /// Integer pre-check before the floating point ratio test
    fn quick_ratio_check(lengths: &[usize; 5]) -> bool {
        let [b1, w1, b2, w2, b3] = *lengths;
        let total = b1 + w1 + b2 + w2 + b3;
        if total < MIN_PATTERN_WIDTH {
            return false;
        }

        let outer_min = b1.min(b3).max(1);
        if b2 < outer_min * 2 || b2 > outer_min * 5 {
            return false;
        }

        let outer_avg = (b1 + b3 + w1 + w2) / 4;
        let within = |w: usize| w * 2 >= outer_avg && w <= outer_avg * 2;
        within(w1) && within(w2)
    }

    /// Ratio test; ones within half a module, the center within one module
    fn ratio_matches(lengths: &[usize; 5]) -> Option<f32> {
        let total: usize = lengths.iter().sum();
        if total < MIN_PATTERN_WIDTH {
            return None;
        }
        let unit = total as f32 / 7.0;
        let expected = [1.0f32, 1.0, 3.0, 1.0, 1.0];
        let tolerance = [0.5f32, 0.5, 1.0, 0.5, 0.5];
        lengths
            .iter()
            .zip(expected.iter().zip(tolerance.iter()))
            .all(|(&len, (&exp, &tol))| (len as f32 / unit - exp).abs() <= tol)
            .then_some(unit)
    }

    /// `end_x` is one past the last pixel of the final dark run
    fn check_pattern(lengths: &[usize; 5], end_x: usize, y: usize) -> Option<FinderPattern> {
        let unit = Self::ratio_matches(lengths)?;
        let [_, _, b2, w2, b3] = *lengths;
        let center_x = end_x as f32 - b3 as f32 - w2 as f32 - b2 as f32 / 2.0;
        Some(FinderPattern::new(center_x, y as f32 + 0.5, unit))
    }

    /// Re-measure along the column through the candidate, then along the row
    /// through the refined center
    fn cross_check(matrix: &BitMatrix, candidate: &FinderPattern) -> Option<FinderPattern> {
        let expected_total = candidate.module_size * 7.0;
        let cx = candidate.center.x.floor() as isize;
        let cy = candidate.center.y.floor() as isize;

        let (center_y, vertical_total) =
            Self::measure_line(matrix, cx, cy, (0, 1), expected_total)?;
        let (center_x, horizontal_total) =
            Self::measure_line(matrix, cx, center_y.floor() as isize, (1, 0), expected_total)?;

        let module_size = (vertical_total + horizontal_total) / 14.0;
        Some(FinderPattern::new(center_x, center_y, module_size))
    }

    /// Walk both ways from `(x, y)` along `dir` collecting the five runs.
    /// Returns the refined center coordinate along `dir` and the total length.
    fn measure_line(
        matrix: &BitMatrix,
        x: isize,
        y: isize,
        dir: (isize, isize),
        expected_total: f32,
    ) -> Option<(f32, f32)> {
        let max_run = (expected_total * 0.75).ceil() as usize + 2;
        let at = |step: isize| matrix.get_signed(x + dir.0 * step, y + dir.1 * step);

        if !at(0) {
            return None;
        }

        // Center run, both directions
        let mut back = 0isize;
        while at(-(back + 1)) {
            back += 1;
            if back as usize > max_run {
                return None;
            }
        }
        let mut fwd = 0isize;
        while at(fwd + 1) {
            fwd += 1;
            if fwd as usize > max_run {
                return None;
            }
        }
        let center_run = (back + fwd + 1) as usize;

        let walk = |start: isize, sign: isize| -> Option<(usize, usize)> {
            let mut pos = start;
            let mut light = 0usize;
            while !at(sign * (pos + 1)) {
                pos += 1;
                light += 1;
                if light > max_run {
                    return None;
                }
            }
            let mut dark = 0usize;
            while at(sign * (pos + 1)) {
                pos += 1;
                dark += 1;
                if dark > max_run {
                    return None;
                }
            }
            (light > 0 && dark > 0).then_some((light, dark))
        };

        let (w1, b1) = walk(back, -1)?;
        let (w2, b3) = walk(fwd, 1)?;
        let runs = [b1, w1, center_run, w2, b3];
        Self::ratio_matches(&runs)?;

        let total = runs.iter().sum::<usize>() as f32;
        if 5.0 * (total - expected_total).abs() >= 2.0 * expected_total {
            return None;
        }

        let origin = if dir.0 != 0 { x } else { y };
        let center = origin as f32 + (fwd - back) as f32 / 2.0 + 0.5;
        Some((center, total))
    }

    fn merge_candidates(candidates: Vec<FinderPattern>) -> Vec<FinderPattern> {
        let mut merged: Vec<FinderPattern> = Vec::new();
        for candidate in candidates {
            match merged.iter_mut().find(|existing| existing.is_near(&candidate)) {
                Some(existing) => existing.absorb(&candidate),
                None => merged.push(candidate),
            }
        }
        merged
    }
}
