use crate::decoder::config;
use crate::decoder::format::FormatInfo;
use crate::decoder::qr_decoder::orientation::{self, Orientation};
use crate::decoder::qr_decoder::payload::{self, SymbolContent};
use crate::decoder::version::VersionInfo;
use crate::models::{BitMatrix, ECLevel, MaskPattern, Version};

/// Result of decoding one sampled grid
pub(super) struct MatrixDecode {
    pub content: SymbolContent,
    pub format: FormatInfo,
    pub orientation: Orientation,
}

pub(super) fn decode_from_matrix(qr_matrix: &BitMatrix, version: Version) -> Option<MatrixDecode> {
    if qr_matrix.width() != version.size() || qr_matrix.height() != version.size() {
        return None;
    }

    let orientations = orientation::candidate_orientations(qr_matrix);
    if orientations.is_empty() {
        tracing::trace!(%version, "no orientation matches the finder layout");
        return None;
    }

    let version_agrees = |oriented: &BitMatrix| match VersionInfo::read(oriented) {
        Some(read) => read == version,
        None => true,
    };

    // Fast path: trust the format information that was read.
    let mut tried: Vec<(Orientation, FormatInfo)> = Vec::new();
    for (orientation, oriented) in &orientations {
        if !version_agrees(oriented) {
            continue;
        }
        if let Some(format) = FormatInfo::read(oriented) {
            tried.push((*orientation, format));
            if let Some(content) = payload::decode_symbol(oriented, version, &format) {
                return Some(MatrixDecode {
                    content,
                    format,
                    orientation: *orientation,
                });
            }
        }
    }

    if !config::format_fallback_full_ec() {
        return None;
    }

    // Format area unreadable: try every level and mask on the best orientation.
    let (orientation, oriented) = orientations.first()?;
    if !version_agrees(oriented) {
        return None;
    }
    for ec_level in ECLevel::ALL {
        for mask_pattern in MaskPattern::ALL {
            let format = FormatInfo::new(ec_level, mask_pattern);
            if tried.contains(&(*orientation, format)) {
                continue;
            }
            if let Some(content) = payload::decode_symbol(oriented, version, &format) {
                tracing::debug!(?ec_level, ?mask_pattern, "decoded through format fallback");
                return Some(MatrixDecode {
                    content,
                    format,
                    orientation: *orientation,
                });
            }
        }
    }

    None
}
