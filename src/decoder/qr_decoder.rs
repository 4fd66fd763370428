//! Per-symbol decoding: from a finder triple (or a clean module grid) to a
//! decoded payload

mod geometry;
mod matrix_decode;
mod orientation;
pub(crate) mod payload;


use crate::detector::FinderTriple;
use crate::models::{BitMatrix, DecodedPayload, Point, Version};
use crate::utils::geometry::PerspectiveTransform;
use matrix_decode::MatrixDecode;

/// Borrowed views of one frame after binarization
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    pub binary: &'a BitMatrix,
    pub gray: &'a [u8],
    pub width: usize,
    pub height: usize,
}

pub struct QrDecoder;

impl QrDecoder {
    /// Decode the symbol framed by `triple`, trying the estimated version and
    /// its neighbours, binary sampling first and grayscale sampling second
    pub fn decode_with_gray(view: ImageView<'_>, triple: &FinderTriple) -> Option<DecodedPayload> {
        let estimated = geometry::estimate_version(triple)?;
        for version in geometry::version_candidates(estimated) {
            let dimension = version.size();
            let Some(base) = geometry::build_transform(triple, dimension) else {
                continue;
            };
            let refined = geometry::refine_with_alignment(view.binary, &base, triple, version);
            let transforms = refined.iter().chain(std::iter::once(&base));

            for transform in transforms {
                if let Some(payload) = Self::decode_sampled(view, triple, transform, version) {
                    return Some(payload);
                }
            }
        }
        None
    }

    fn decode_sampled(
        view: ImageView<'_>,
        triple: &FinderTriple,
        transform: &PerspectiveTransform,
        version: Version,
    ) -> Option<DecodedPayload> {
        let dimension = version.size();
        let binary_grid =
            geometry::sample_binary(view.binary, transform, dimension, triple.module_size);
        if let Some(grid) = binary_grid {
            if let Some(decoded) = matrix_decode::decode_from_matrix(&grid, version) {
                return Self::finish(decoded, version, Some(transform));
            }
        }

        let gray_grid =
            geometry::sample_gray(view.gray, view.width, view.height, transform, dimension)?;
        let decoded = matrix_decode::decode_from_matrix(&gray_grid, version)?;
        tracing::trace!(%version, "decoded from grayscale samples");
        Self::finish(decoded, version, Some(transform))
    }

    /// Decode an already sampled module grid (one module per cell, no quiet zone)
    pub fn decode_matrix(matrix: &BitMatrix) -> Option<DecodedPayload> {
        if matrix.width() != matrix.height() {
            return None;
        }
        let version = Version::from_size(matrix.width())?;
        let decoded = matrix_decode::decode_from_matrix(matrix, version)?;
        Self::finish(decoded, version, None)
    }

    fn finish(
        decoded: MatrixDecode,
        version: Version,
        transform: Option<&PerspectiveTransform>,
    ) -> Option<DecodedPayload> {
        let location = match transform {
            Some(t) => Some(Self::locate(decoded.orientation, version, t)?),
            None => None,
        };
        tracing::debug!(
            %version,
            ec_level = ?decoded.format.ec_level,
            mask = decoded.format.mask_pattern.bits(),
            "symbol decoded"
        );
        Some(DecodedPayload {
            text: decoded.content.text,
            bytes: decoded.content.bytes,
            location,
            version,
            ec_level: decoded.format.ec_level,
            mask: decoded.format.mask_pattern,
        })
    }

    /// Symbol corners in image space, ordered top-left, top-right,
    /// bottom-right, bottom-left as the symbol reads
    fn locate(
        orientation: orientation::Orientation,
        version: Version,
        transform: &PerspectiveTransform,
    ) -> Option<[Point; 4]> {
        let n = version.size() as f32;
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(n, 0.0),
            Point::new(n, n),
            Point::new(0.0, n),
        ];
        let mut out = [Point::default(); 4];
        for (slot, corner) in out.iter_mut().zip(corners) {
            *slot = transform.transform(&orientation.to_sampled(corner, n))?;
        }
        Some(out)
    }
}
