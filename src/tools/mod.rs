//! Image file helpers shared by `qrtool` and the benches.
use crate::error::StaticImageError;
use crate::models::{BitMatrix, FrameBuffer};
use crate::pipeline::Binarizer;
use crate::scan::source::SUPPORTED_UPLOAD_EXTENSIONS;
use crate::utils::grayscale::rgba_to_grayscale;
use image::{GenericImageView, ImageEncoder};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Longest side images are shrunk to when `QR_MAX_DIM` is set (0 disables)
fn max_dim_from_env() -> Option<u32> {
    env::var("QR_MAX_DIM")
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|&v| v > 0)
}

/// Load an image file as an RGBA frame, downscaled per `QR_MAX_DIM`
pub fn load_frame<P: AsRef<Path>>(path: P) -> Result<FrameBuffer, StaticImageError> {
    let mut img = image::open(path)?;
    if let Some(max_dim) = max_dim_from_env() {
        let (w, h) = img.dimensions();
        if w.max(h) > max_dim {
            img = img.resize(max_dim, max_dim, image::imageops::FilterType::Triangle);
        }
    }
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(FrameBuffer::new(
        width as usize,
        height as usize,
        rgba.into_raw(),
    )?)
}

/// Write a frame as PNG
pub fn save_png<P: AsRef<Path>>(frame: &FrameBuffer, path: P) -> Result<(), image::ImageError> {
    image::save_buffer(
        path,
        frame.data(),
        frame.width() as u32,
        frame.height() as u32,
        image::ColorType::Rgba8,
    )
}

/// Encode a frame as PNG bytes
pub fn encode_png(frame: &FrameBuffer) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out).write_image(
        frame.data(),
        frame.width() as u32,
        frame.height() as u32,
        image::ColorType::Rgba8,
    )?;
    Ok(out)
}

/// Summary of a frame as the binarizers see it
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameStats {
    pub min_luma: u8,
    pub max_luma: u8,
    pub mean_luma: u8,
    pub binarizer: Binarizer,
    /// Share of dark pixels after the preferred binarizer
    pub dark_ratio: f64,
}

pub fn frame_stats(frame: &FrameBuffer) -> FrameStats {
    let gray = rgba_to_grayscale(frame.data(), frame.width(), frame.height());
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    let mut sum: u64 = 0;
    for &v in &gray {
        min = min.min(v);
        max = max.max(v);
        sum += v as u64;
    }
    let mean = if gray.is_empty() {
        0
    } else {
        (sum / gray.len() as u64) as u8
    };

    let binarizer = Binarizer::for_frame(frame.width(), frame.height());
    let binary = binarizer.apply(&gray, frame.width(), frame.height());
    FrameStats {
        min_luma: min,
        max_luma: max,
        mean_luma: mean,
        binarizer,
        dark_ratio: dark_ratio(&binary),
    }
}

fn dark_ratio(binary: &BitMatrix) -> f64 {
    let total = binary.width() * binary.height();
    if total == 0 {
        return 0.0;
    }
    binary.count_dark() as f64 / total as f64
}

/// A single image, or every supported image under a directory, sorted
pub fn collect_images(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }

    let mut stack = vec![root.to_path_buf()];
    let mut images = Vec::new();
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let supported = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    SUPPORTED_UPLOAD_EXTENSIONS
                        .iter()
                        .any(|s| ext.eq_ignore_ascii_case(s))
                });
            if supported {
                images.push(path);
            }
        }
    }
    images.sort();
    images
}
