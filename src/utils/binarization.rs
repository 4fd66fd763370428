use crate::models::BitMatrix;

/// Default adaptive window (pixels per side, odd)
pub const DEFAULT_WINDOW: usize = 31;

/// Local offset below the window mean for a pixel to count as dark
const ADAPTIVE_OFFSET: i32 = 7;

/// Convert grayscale image to binary using Otsu's thresholding method
/// Returns a BitMatrix where true = black, false = white
pub fn otsu_binarize(gray: &[u8], width: usize, height: usize) -> BitMatrix {
    let threshold = calculate_otsu_threshold(gray);
    threshold_binarize(gray, width, height, threshold)
}

/// Otsu's optimal threshold; pixels strictly below it are dark
pub fn calculate_otsu_threshold(gray: &[u8]) -> u8 {
    let mut histogram = [0u64; 256];
    for &pixel in gray {
        histogram[pixel as usize] += 1;
    }

    let total = gray.len() as u64;
    if total == 0 {
        return 128;
    }
    let total_sum: u64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as u64 * count)
        .sum();

    let mut below_count = 0u64;
    let mut below_sum = 0u64;
    let mut max_variance = 0.0f64;
    let mut optimal = 128u8;

    // Threshold t splits [0, t) from [t, 255]
    for t in 1..=255usize {
        below_count += histogram[t - 1];
        below_sum += (t as u64 - 1) * histogram[t - 1];
        let above_count = total - below_count;
        if below_count == 0 || above_count == 0 {
            continue;
        }

        let mean_below = below_sum as f64 / below_count as f64;
        let mean_above = (total_sum - below_sum) as f64 / above_count as f64;
        let w_below = below_count as f64 / total as f64;
        let w_above = above_count as f64 / total as f64;
        let variance = w_below * w_above * (mean_below - mean_above).powi(2);

        if variance > max_variance {
            max_variance = variance;
            optimal = t as u8;
        }
    }

    optimal
}

/// Local-mean thresholding over a square window, computed with an integral image.
///
/// Pixels whose window is flat (within the offset of their own value) fall back
/// to the global Otsu threshold, so large uniform regions keep their polarity.
pub fn adaptive_binarize(gray: &[u8], width: usize, height: usize, window: usize) -> BitMatrix {
    let mut binary = BitMatrix::new(width, height);
    if width == 0 || height == 0 || gray.len() < width * height {
        return binary;
    }

    let global = calculate_otsu_threshold(gray) as i32;
    let half = (window.max(3) / 2) as isize;

    // integral[(y+1)*(w+1) + (x+1)] = sum of gray[0..=y][0..=x]
    let stride = width + 1;
    let mut integral = vec![0u64; stride * (height + 1)];
    for y in 0..height {
        let mut row_sum = 0u64;
        for x in 0..width {
            row_sum += gray[y * width + x] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    for y in 0..height {
        let y0 = (y as isize - half).max(0) as usize;
        let y1 = ((y as isize + half) as usize).min(height - 1) + 1;
        for x in 0..width {
            let x0 = (x as isize - half).max(0) as usize;
            let x1 = ((x as isize + half) as usize).min(width - 1) + 1;

            let area = ((y1 - y0) * (x1 - x0)) as u64;
            let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let mean = (sum / area) as i32;
            let pixel = gray[y * width + x] as i32;

            let dark = if (pixel - mean).abs() <= ADAPTIVE_OFFSET {
                pixel < global
            } else {
                pixel < mean - ADAPTIVE_OFFSET
            };
            if dark {
                binary.set(x, y, true);
            }
        }
    }

    binary
}

/// Simple global threshold binarization
pub fn threshold_binarize(gray: &[u8], width: usize, height: usize, threshold: u8) -> BitMatrix {
    let mut binary = BitMatrix::new(width, height);
    for (idx, &value) in gray.iter().take(width * height).enumerate() {
        if value < threshold {
            binary.set(idx % width, idx / width, true);
        }
    }
    binary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_binarize() {
        let gray = vec![100, 150, 200, 50];
        let binary = threshold_binarize(&gray, 2, 2, 128);

        assert!(binary.get(0, 0));
        assert!(!binary.get(1, 0));
        assert!(!binary.get(0, 1));
        assert!(binary.get(1, 1));
    }

    #[test]
    fn test_otsu_binarize() {
        let mut gray = vec![50u8; 50];
        gray.extend(vec![200u8; 50]);

        let binary = otsu_binarize(&gray, 10, 10);
        assert!(binary.get(0, 0));
        assert!(!binary.get(0, 7));
    }

    #[test]
    fn test_otsu_pure_black_and_white() {
        let gray = [0u8, 255, 0, 255];
        let threshold = calculate_otsu_threshold(&gray);
        assert!(threshold > 0);
        let binary = otsu_binarize(&gray, 2, 2);
        assert!(binary.get(0, 0));
        assert!(!binary.get(1, 0));
    }

    #[test]
    fn test_adaptive_handles_gradient() {
        // Left-to-right lighting gradient with a dark bar at x = 20..24
        let width = 64;
        let height = 16;
        let mut gray = vec![0u8; width * height];
        for y in 0..height {
            for x in 0..width {
                let base = 90 + (x as i32 * 2);
                let value = if (20..24).contains(&x) { base - 60 } else { base };
                gray[y * width + x] = value.clamp(0, 255) as u8;
            }
        }

        let binary = adaptive_binarize(&gray, width, height, DEFAULT_WINDOW);
        assert!(binary.get(21, 8));
        assert!(!binary.get(50, 8));
    }

    #[test]
    fn test_adaptive_keeps_large_dark_region() {
        let width = 80;
        let height = 80;
        let gray: Vec<u8> = (0..width * height)
            .map(|i| if i % width < 40 { 10 } else { 240 })
            .collect();
        let binary = adaptive_binarize(&gray, width, height, 15);
        assert!(binary.get(5, 40));
        assert!(!binary.get(75, 40));
    }
}
