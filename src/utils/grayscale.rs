//! RGBA to 8-bit luma.
//!
//! Y = 0.299*R + 0.587*G + 0.114*B, computed with fixed-point integers as
//! Y = (76*R + 150*G + 29*B) >> 8.

use rayon::prelude::*;

const COEF_R: u32 = 76;
const COEF_G: u32 = 150;
const COEF_B: u32 = 29;

/// Frames with at least this many pixels are converted row-parallel
pub const PARALLEL_THRESHOLD: usize = 640 * 480;

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let lum = (COEF_R * r as u32 + COEF_G * g as u32 + COEF_B * b as u32) >> 8;
    lum.min(255) as u8
}

fn convert_row(src: &[u8], channels: usize, dst: &mut [u8]) {
    for (out, px) in dst.iter_mut().zip(src.chunks_exact(channels)) {
        *out = luma(px[0], px[1], px[2]);
    }
}

fn convert(pixels: &[u8], channels: usize, width: usize, height: usize) -> Vec<u8> {
    let pixel_count = width * height;
    let mut gray = vec![0u8; pixel_count];
    if width == 0 || pixels.len() < pixel_count * channels {
        return gray;
    }

    let stride = width * channels;
    if pixel_count >= PARALLEL_THRESHOLD {
        gray.par_chunks_mut(width)
            .zip(pixels.par_chunks(stride))
            .for_each(|(row, src)| convert_row(src, channels, row));
    } else {
        gray.chunks_mut(width)
            .zip(pixels.chunks(stride))
            .for_each(|(row, src)| convert_row(src, channels, row));
    }
    gray
}

/// Convert an RGBA image to grayscale (alpha ignored)
pub fn rgba_to_grayscale(rgba: &[u8], width: usize, height: usize) -> Vec<u8> {
    convert(rgba, 4, width, height)
}
