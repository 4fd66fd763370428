//! Frame-level detection: binarize, locate finders, group them into
//! candidate symbols and decode each group.
use crate::decoder::config;
use crate::decoder::qr_decoder::{ImageView, QrDecoder};
use crate::detector::{FinderDetector, FinderPattern, FinderTriple};
use crate::models::{BitMatrix, DecodedPayload, Point};
use crate::utils::binarization::{DEFAULT_WINDOW, adaptive_binarize, otsu_binarize};
use crate::utils::geometry::{corner_cosine, cross};
use serde::Serialize;

/// Frames with a side at least this long start with the adaptive binarizer
pub const ADAPTIVE_MIN_SIDE: usize = 800;

/// Which binarizer produced a matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Binarizer {
    Otsu,
    Adaptive,
}

impl Binarizer {
    /// Preferred binarizer for a frame size
    pub fn for_frame(width: usize, height: usize) -> Self {
        if width >= ADAPTIVE_MIN_SIDE || height >= ADAPTIVE_MIN_SIDE {
            Binarizer::Adaptive
        } else {
            Binarizer::Otsu
        }
    }

    pub fn other(self) -> Self {
        match self {
            Binarizer::Otsu => Binarizer::Adaptive,
            Binarizer::Adaptive => Binarizer::Otsu,
        }
    }

    pub fn apply(self, gray: &[u8], width: usize, height: usize) -> BitMatrix {
        match self {
            Binarizer::Otsu => otsu_binarize(gray, width, height),
            Binarizer::Adaptive => adaptive_binarize(gray, width, height, DEFAULT_WINDOW),
        }
    }
}

/// Stage counters for one detection run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionTelemetry {
    pub binarizers_tried: Vec<Binarizer>,
    pub finder_patterns: usize,
    pub groups_formed: usize,
    pub groups_ordered: usize,
    pub symbols_decoded: usize,
}

/// Run the full detection pipeline on a grayscale frame. At most
/// `max_symbols` payloads are returned.
pub(crate) fn detect_gray(
    gray: &[u8],
    width: usize,
    height: usize,
    max_symbols: usize,
) -> (Vec<DecodedPayload>, DetectionTelemetry) {
    let mut telemetry = DetectionTelemetry::default();
    if width == 0 || height == 0 || gray.len() < width * height {
        return (Vec::new(), telemetry);
    }

    let first = Binarizer::for_frame(width, height);
    let mut results = Vec::new();
    for binarizer in [first, first.other()] {
        let binary = binarizer.apply(gray, width, height);
        let patterns = FinderDetector::detect(&binary);
        telemetry.binarizers_tried.push(binarizer);
        telemetry.finder_patterns = telemetry.finder_patterns.max(patterns.len());
        tracing::trace!(?binarizer, patterns = patterns.len(), "finder scan");
        if patterns.len() < 3 {
            continue;
        }

        let view = ImageView {
            binary: &binary,
            gray,
            width,
            height,
        };
        results = decode_groups(view, &patterns, max_symbols, &mut telemetry);
        if !results.is_empty() {
            break;
        }
    }

    telemetry.symbols_decoded = results.len();
    (results, telemetry)
}

/// Assign the three centers to corners. The corner closest to a right angle
/// is top-left; the winding decides which of the others is top-right.
pub(crate) fn order_finder_patterns(
    a: &FinderPattern,
    b: &FinderPattern,
    c: &FinderPattern,
) -> Option<FinderTriple> {
    let patterns = [a, b, c];
    if patterns.iter().any(|p| p.module_size < 1.0) {
        return None;
    }

    let mut best_idx = None;
    let mut best_cos = f32::INFINITY;
    for i in 0..3 {
        let p = &patterns[i].center;
        let p1 = &patterns[(i + 1) % 3].center;
        let p2 = &patterns[(i + 2) % 3].center;
        if let Some(cos) = corner_cosine(p, p1, p2) {
            if cos < best_cos {
                best_cos = cos;
                best_idx = Some(i);
            }
        }
    }
    let best_idx = best_idx?;

    let tl = patterns[best_idx];
    let p1 = patterns[(best_idx + 1) % 3];
    let p2 = patterns[(best_idx + 2) % 3];
    let (tr, bl) = if cross(&tl.center, &p1.center, &p2.center) > 0.0 {
        (p1, p2)
    } else {
        (p2, p1)
    };

    let avg_module = (tl.module_size + tr.module_size + bl.module_size) / 3.0;
    let d_tr = tl.center.distance(&tr.center);
    let d_bl = tl.center.distance(&bl.center);

    let dim1 = estimate_dimension_from_distance(d_tr, avg_module)?;
    let dim2 = estimate_dimension_from_distance(d_bl, avg_module)?;
    let dim = if dim1.abs_diff(dim2) <= 4 {
        ((dim1 + dim2) / 2).max(21)
    } else {
        return None;
    };

    let module_size = (d_tr + d_bl) / 2.0 / (dim as f32 - 7.0);
    let module_ratio = module_size / avg_module;
    if !(0.7..=1.3).contains(&module_ratio) {
        return None;
    }

    Some(FinderTriple {
        top_left: tl.center,
        top_right: tr.center,
        bottom_left: bl.center,
        module_size,
    })
}

fn estimate_dimension_from_distance(distance: f32, module_size: f32) -> Option<usize> {
    if module_size <= 0.0 {
        return None;
    }
    let raw_dim = distance / module_size + 7.0;
    if raw_dim < 19.0 {
        return None;
    }
    let version = ((raw_dim - 17.0) / 4.0).round() as i32;
    if !(1..=40).contains(&version) {
        return None;
    }
    Some(17 + 4 * version as usize)
}

/// Bin patterns by module size and build candidate triples within each bin
/// and its neighbour
pub(crate) fn group_finder_patterns(patterns: &[FinderPattern]) -> Vec<[usize; 3]> {
    if patterns.len() < 3 {
        return Vec::new();
    }

    let mut indexed: Vec<(usize, f32)> = patterns
        .iter()
        .enumerate()
        .map(|(i, p)| (i, p.module_size))
        .collect();
    indexed.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut bins: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut bin_min = 0.0f32;
    let bin_ratio = 1.25f32;

    for (idx, size) in indexed {
        if current.is_empty() {
            current.push(idx);
            bin_min = size;
        } else if size <= bin_min * bin_ratio {
            current.push(idx);
        } else {
            bins.push(std::mem::take(&mut current));
            current.push(idx);
            bin_min = size;
        }
    }
    if !current.is_empty() {
        bins.push(current);
    }

    let mut all_groups: Vec<[usize; 3]> = Vec::new();
    for i in 0..bins.len() {
        let mut indices = bins[i].clone();
        if let Some(next) = bins.get(i + 1) {
            indices.extend_from_slice(next);
        }
        if indices.len() < 3 {
            continue;
        }
        for group in build_groups(patterns, &indices) {
            let mut key = group;
            key.sort_unstable();
            if !all_groups.iter().any(|g| {
                let mut existing = *g;
                existing.sort_unstable();
                existing == key
            }) {
                all_groups.push(group);
            }
        }
    }

    all_groups
}

struct TriangleShape {
    size_ratio: f32,
    distortion: f32,
    best_cos: f32,
    min_distance: f32,
    max_distance: f32,
}

fn triangle_shape(patterns: &[FinderPattern], group: &[usize; 3]) -> TriangleShape {
    let [p0, p1, p2] = group.map(|i| &patterns[i]);

    let sizes = [p0.module_size, p1.module_size, p2.module_size];
    let min_size = sizes.iter().fold(f32::INFINITY, |a, &b| a.min(b));
    let max_size = sizes.iter().fold(0.0f32, |a, &b| a.max(b));

    let d01 = p0.center.distance(&p1.center);
    let d02 = p0.center.distance(&p2.center);
    let d12 = p1.center.distance(&p2.center);
    let min_distance = d01.min(d02).min(d12);
    let max_distance = d01.max(d02).max(d12);

    let a2 = d01 * d01;
    let b2 = d02 * d02;
    let c2 = d12 * d12;
    let cos_0 = ((a2 + b2 - c2) / (2.0 * d01 * d02)).abs();
    let cos_1 = ((a2 + c2 - b2) / (2.0 * d01 * d12)).abs();
    let cos_2 = ((b2 + c2 - a2) / (2.0 * d02 * d12)).abs();

    TriangleShape {
        size_ratio: max_size / min_size.max(f32::EPSILON),
        distortion: max_distance / min_distance.max(f32::EPSILON),
        best_cos: cos_0.min(cos_1).min(cos_2),
        min_distance,
        max_distance,
    }
}

fn build_groups(patterns: &[FinderPattern], indices: &[usize]) -> Vec<[usize; 3]> {
    let mut groups = Vec::new();

    for (a, &i) in indices.iter().enumerate() {
        for (b, &j) in indices.iter().enumerate().skip(a + 1) {
            for &k in indices.iter().skip(b + 1) {
                let group = [i, j, k];
                let shape = triangle_shape(patterns, &group);
                let avg_module = group.iter().map(|&g| patterns[g].module_size).sum::<f32>() / 3.0;

                if shape.size_ratio > 2.0
                    || shape.min_distance < avg_module * 2.5
                    || shape.max_distance > 3000.0
                    || shape.distortion > 5.0
                    || !(shape.best_cos < 0.4)
                {
                    continue;
                }
                groups.push(group);
            }
        }
    }

    groups
}

/// Best-shaped groups first, at most `max_groups` kept
pub(crate) fn score_and_trim_groups(
    groups: &mut Vec<[usize; 3]>,
    patterns: &[FinderPattern],
    max_groups: usize,
) {
    groups.sort_by(|a, b| group_score(patterns, a).total_cmp(&group_score(patterns, b)));
    groups.truncate(max_groups);
}

fn group_score(patterns: &[FinderPattern], group: &[usize; 3]) -> f32 {
    let shape = triangle_shape(patterns, group);
    shape.size_ratio * 2.0 + shape.distortion + shape.best_cos
}

fn decode_groups(
    view: ImageView<'_>,
    finder_patterns: &[FinderPattern],
    max_symbols: usize,
    telemetry: &mut DetectionTelemetry,
) -> Vec<DecodedPayload> {
    let mut results: Vec<DecodedPayload> = Vec::new();
    let mut groups = group_finder_patterns(finder_patterns);
    score_and_trim_groups(&mut groups, finder_patterns, config::max_groups());
    telemetry.groups_formed += groups.len();

    tracing::trace!(
        patterns = finder_patterns.len(),
        groups = groups.len(),
        "finder groups formed"
    );

    for (group_idx, group) in groups.iter().enumerate() {
        let [a, b, c] = group.map(|i| &finder_patterns[i]);
        let Some(triple) = order_finder_patterns(a, b, c) else {
            continue;
        };
        telemetry.groups_ordered += 1;

        match QrDecoder::decode_with_gray(view, &triple) {
            Some(payload) => {
                tracing::trace!(group_idx, "group decoded");
                if !results.iter().any(|seen| is_same_symbol(seen, &payload)) {
                    results.push(payload);
                }
                if results.len() >= max_symbols {
                    break;
                }
            }
            None => tracing::trace!(group_idx, "group failed to decode"),
        }
    }

    results
}

fn is_same_symbol(a: &DecodedPayload, b: &DecodedPayload) -> bool {
    if a.bytes != b.bytes {
        return false;
    }
    match (a.location, b.location) {
        (Some(la), Some(lb)) => {
            let centroid = |l: [Point; 4]| {
                let x = l.iter().map(|p| p.x).sum::<f32>() / 4.0;
                let y = l.iter().map(|p| p.y).sum::<f32>() / 4.0;
                Point::new(x, y)
            };
            let side = la[0].distance(&la[1]).max(1.0);
            centroid(la).distance(&centroid(lb)) < side / 2.0
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(x: f32, y: f32, module_size: f32) -> FinderPattern {
        FinderPattern::new(x, y, module_size)
    }

    #[test]
    fn test_order_assigns_corners() {
        let tl = pattern(14.0, 14.0, 4.0);
        let tr = pattern(70.0, 14.0, 4.0);
        let bl = pattern(14.0, 70.0, 4.0);
        for (a, b, c) in [(&tl, &tr, &bl), (&bl, &tl, &tr), (&tr, &bl, &tl), (&bl, &tr, &tl)] {
            let triple = order_finder_patterns(a, b, c).unwrap();
            assert_eq!(triple.top_left, tl.center);
            assert_eq!(triple.top_right, tr.center);
            assert_eq!(triple.bottom_left, bl.center);
            assert!((triple.module_size - 4.0).abs() < 0.01);
        }
    }

    #[test]
    fn test_group_rejects_collinear_patterns() {
        let patterns = [
            pattern(10.0, 10.0, 3.0),
            pattern(60.0, 10.0, 3.0),
            pattern(110.0, 10.0, 3.0),
        ];
        assert!(group_finder_patterns(&patterns).is_empty());
    }

    #[test]
    fn test_group_and_trim_prefers_right_angles() {
        let patterns = [
            pattern(14.0, 14.0, 4.0),
            pattern(70.0, 14.0, 4.0),
            pattern(14.0, 70.0, 4.0),
            pattern(80.0, 95.0, 4.0),
        ];
        let mut groups = group_finder_patterns(&patterns);
        assert!(groups.len() >= 2);
        score_and_trim_groups(&mut groups, &patterns, 1);
        let mut best = groups[0];
        best.sort_unstable();
        assert_eq!(best, [0, 1, 2]);
    }

    #[test]
    fn test_binarizer_choice() {
        assert_eq!(Binarizer::for_frame(640, 480), Binarizer::Otsu);
        assert_eq!(Binarizer::for_frame(1024, 600), Binarizer::Adaptive);
        assert_eq!(Binarizer::Otsu.other(), Binarizer::Adaptive);
    }

    #[test]
    fn test_detect_gray_blank_frame() {
        let gray = vec![255u8; 64 * 64];
        let (results, telemetry) = detect_gray(&gray, 64, 64, 1);
        assert!(results.is_empty());
        assert_eq!(telemetry.binarizers_tried, vec![Binarizer::Otsu, Binarizer::Adaptive]);
        assert_eq!(telemetry.symbols_decoded, 0);
    }
}
