use crate::decoder::tables::alignment_pattern_positions;
use crate::detector::FinderTriple;
use crate::models::{BitMatrix, Point, Version};
use crate::utils::binarization::calculate_otsu_threshold;
use crate::utils::geometry::PerspectiveTransform;

/// Alignment pattern mismatches (of 25 modules) accepted during refinement
const MAX_ALIGNMENT_MISMATCH: usize = 3;

/// Parallelogram completion of the three finder centers
pub(super) fn calculate_bottom_right(triple: &FinderTriple) -> Point {
    Point::new(
        triple.top_right.x + triple.bottom_left.x - triple.top_left.x,
        triple.top_right.y + triple.bottom_left.y - triple.top_left.y,
    )
}

/// Version implied by the finder spacing, before any rounding to 1-40
pub(super) fn estimate_version(triple: &FinderTriple) -> Option<i32> {
    if triple.module_size < 1.0 || !triple.module_size.is_finite() {
        return None;
    }
    let across = triple.top_left.distance(&triple.top_right) / triple.module_size;
    let down = triple.top_left.distance(&triple.bottom_left) / triple.module_size;
    let dimension = (across + down) / 2.0 + 7.0;
    if !dimension.is_finite() || dimension < 17.0 {
        return None;
    }
    Some(((dimension - 17.0) / 4.0).round() as i32)
}

/// The estimate first, then its neighbours out to two versions away
pub(super) fn version_candidates(estimated: i32) -> Vec<Version> {
    [0, 1, -1, 2, -2]
        .iter()
        .filter_map(|delta| {
            let v = estimated + delta;
            u8::try_from(v).ok().and_then(Version::new)
        })
        .collect()
}

fn finder_module_centers(dimension: usize) -> [Point; 3] {
    let far = dimension as f32 - 3.5;
    [
        Point::new(3.5, 3.5),
        Point::new(far, 3.5),
        Point::new(3.5, far),
    ]
}

/// Module space to image space from the finders plus the parallelogram corner
pub(super) fn build_transform(
    triple: &FinderTriple,
    dimension: usize,
) -> Option<PerspectiveTransform> {
    let [tl, tr, bl] = finder_module_centers(dimension);
    let far = dimension as f32 - 3.5;
    let src = [tl, tr, bl, Point::new(far, far)];
    let dst = [
        triple.top_left,
        triple.top_right,
        triple.bottom_left,
        calculate_bottom_right(triple),
    ];
    PerspectiveTransform::from_points(&src, &dst)
}

/// Re-anchor the fourth corner on the bottom-right alignment pattern
pub(super) fn refine_with_alignment(
    binary: &BitMatrix,
    transform: &PerspectiveTransform,
    triple: &FinderTriple,
    version: Version,
) -> Option<PerspectiveTransform> {
    if version.number() < 2 {
        return None;
    }
    let positions = alignment_pattern_positions(version);
    let last = *positions.last()?;
    let align_src = Point::new(last as f32 + 0.5, last as f32 + 0.5);
    let predicted = transform.transform(&align_src)?;
    let found = find_alignment_center(binary, predicted, triple.module_size)?;

    let [tl, tr, bl] = finder_module_centers(version.size());
    let src = [tl, tr, bl, align_src];
    let dst = [triple.top_left, triple.top_right, triple.bottom_left, found];
    PerspectiveTransform::from_points(&src, &dst)
}

fn find_alignment_center(binary: &BitMatrix, predicted: Point, module_size: f32) -> Option<Point> {
    if !predicted.is_finite() {
        return None;
    }

    let radius = (module_size * 4.0).max(4.0);
    let max_x = binary.width().saturating_sub(1) as f32;
    let max_y = binary.height().saturating_sub(1) as f32;
    let min_x = (predicted.x - radius).floor().clamp(0.0, max_x) as usize;
    let hi_x = (predicted.x + radius).ceil().clamp(0.0, max_x) as usize;
    let min_y = (predicted.y - radius).floor().clamp(0.0, max_y) as usize;
    let hi_y = (predicted.y + radius).ceil().clamp(0.0, max_y) as usize;

    let mut best: Option<(Point, usize, f32)> = None;
    for y in min_y..=hi_y {
        for x in min_x..=hi_x {
            let center = Point::new(x as f32 + 0.5, y as f32 + 0.5);
            let Some(mismatch) = alignment_pattern_mismatch(binary, &center, module_size) else {
                continue;
            };
            let distance = center.distance_squared(&predicted);
            let better = match best {
                None => true,
                Some((_, m, d)) => mismatch < m || (mismatch == m && distance < d),
            };
            if better {
                best = Some((center, mismatch, distance));
            }
        }
    }

    match best {
        Some((center, mismatch, _)) if mismatch <= MAX_ALIGNMENT_MISMATCH => Some(center),
        _ => None,
    }
}

/// 5x5 module comparison: dark ring, light ring, dark center
fn alignment_pattern_mismatch(binary: &BitMatrix, center: &Point, module_size: f32) -> Option<usize> {
    let mut mismatches = 0usize;
    for dy in -2i32..=2 {
        for dx in -2i32..=2 {
            let expected = dx.abs() == 2 || dy.abs() == 2 || (dx == 0 && dy == 0);
            let sx = (center.x + dx as f32 * module_size).floor();
            let sy = (center.y + dy as f32 * module_size).floor();
            if sx < 0.0 || sy < 0.0 || sx >= binary.width() as f32 || sy >= binary.height() as f32 {
                return None;
            }
            if binary.get(sx as usize, sy as usize) != expected {
                mismatches += 1;
            }
        }
    }
    Some(mismatches)
}

/// Sample module centers from the binarized frame. Modules of three pixels or
/// more take a 3x3 majority vote, smaller ones a single pixel.
pub(super) fn sample_binary(
    binary: &BitMatrix,
    transform: &PerspectiveTransform,
    dimension: usize,
    module_size: f32,
) -> Option<BitMatrix> {
    let reach: isize = if module_size >= 3.0 { 1 } else { 0 };
    let mut result = BitMatrix::new(dimension, dimension);
    for y in 0..dimension {
        for x in 0..dimension {
            let p = transform.transform(&Point::new(x as f32 + 0.5, y as f32 + 0.5))?;
            let px = p.x.floor() as isize;
            let py = p.y.floor() as isize;
            let mut dark = 0;
            let mut total = 0;
            for dy in -reach..=reach {
                for dx in -reach..=reach {
                    total += 1;
                    if binary.get_signed(px + dx, py + dy) {
                        dark += 1;
                    }
                }
            }
            if dark * 2 > total {
                result.set(x, y, true);
            }
        }
    }
    Some(result)
}

/// Grayscale sampler: 3x3 mean per module, thresholded by Otsu over the
/// samples themselves
pub(super) fn sample_gray(
    gray: &[u8],
    width: usize,
    height: usize,
    transform: &PerspectiveTransform,
    dimension: usize,
) -> Option<BitMatrix> {
    if gray.len() < width * height {
        return None;
    }
    let mut samples = Vec::with_capacity(dimension * dimension);
    for y in 0..dimension {
        for x in 0..dimension {
            let p = transform.transform(&Point::new(x as f32 + 0.5, y as f32 + 0.5))?;
            let px = p.x.floor() as isize;
            let py = p.y.floor() as isize;
            let mut sum = 0u32;
            let mut count = 0u32;
            for dy in -1..=1isize {
                for dx in -1..=1isize {
                    let sx = px + dx;
                    let sy = py + dy;
                    if sx >= 0 && sy >= 0 && (sx as usize) < width && (sy as usize) < height {
                        sum += gray[sy as usize * width + sx as usize] as u32;
                        count += 1;
                    }
                }
            }
            samples.push(if count > 0 { (sum / count) as u8 } else { 255 });
        }
    }

    let threshold = calculate_otsu_threshold(&samples);
    let mut result = BitMatrix::new(dimension, dimension);
    for (i, &sample) in samples.iter().enumerate() {
        if sample < threshold {
            result.set(i % dimension, i / dimension, true);
        }
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(scale: f32, dimension: usize) -> FinderTriple {
        let far = (dimension as f32 - 3.5) * scale;
        let near = 3.5 * scale;
        FinderTriple {
            top_left: Point::new(near, near),
            top_right: Point::new(far, near),
            bottom_left: Point::new(near, far),
            module_size: scale,
        }
    }

    #[test]
    fn test_estimate_version() {
        assert_eq!(estimate_version(&triple(4.0, 21)), Some(1));
        assert_eq!(estimate_version(&triple(3.0, 45)), Some(7));
        let mut tiny = triple(4.0, 21);
        tiny.module_size = 0.5;
        assert_eq!(estimate_version(&tiny), None);
    }

    #[test]
    fn test_version_candidates_order() {
        let numbers: Vec<u8> = version_candidates(1).iter().map(|v| v.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        let numbers: Vec<u8> = version_candidates(5).iter().map(|v| v.number()).collect();
        assert_eq!(numbers, vec![5, 6, 4, 7, 3]);
        assert!(version_candidates(45).is_empty());
    }

    #[test]
    fn test_transform_maps_module_grid() {
        let t = triple(4.0, 21);
        let transform = build_transform(&t, 21).unwrap();
        let corner = transform.transform(&Point::new(21.0, 21.0)).unwrap();
        assert!((corner.x - 84.0).abs() < 1e-3);
        assert!((corner.y - 84.0).abs() < 1e-3);
    }

    #[test]
    fn test_sample_binary_scaled_grid() {
        let modules = BitMatrix::from_fn(21, |x, y| (x + 2 * y) % 3 == 0);
        let scale = 4usize;
        let mut image = BitMatrix::new(21 * scale, 21 * scale);
        for y in 0..21 * scale {
            for x in 0..21 * scale {
                image.set(x, y, modules.get(x / scale, y / scale));
            }
        }
        let transform = build_transform(&triple(4.0, 21), 21).unwrap();
        let sampled = sample_binary(&image, &transform, 21, 4.0).unwrap();
        assert_eq!(sampled, modules);
    }
}
