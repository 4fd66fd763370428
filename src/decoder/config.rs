//! Decoder tuning knobs, read once from the environment.
use std::sync::OnceLock;

fn parse_env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn parse_env_bool_u8(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u8>().ok())
        .map(|v| v != 0)
        .unwrap_or(default)
}

static MAX_GROUPS: OnceLock<usize> = OnceLock::new();

/// Finder triples kept after scoring (`QR_MAX_GROUPS`, default 40)
pub(crate) fn max_groups() -> usize {
    *MAX_GROUPS.get_or_init(|| parse_env_usize("QR_MAX_GROUPS", 40).clamp(1, 200))
}

static FORMAT_FALLBACK_FULL_EC: OnceLock<bool> = OnceLock::new();

/// Try all 32 level/mask combinations when the format area is unreadable
/// (`QR_FORMAT_FALLBACK_FULL_EC`, default on)
pub(crate) fn format_fallback_full_ec() -> bool {
    *FORMAT_FALLBACK_FULL_EC.get_or_init(|| parse_env_bool_u8("QR_FORMAT_FALLBACK_FULL_EC", true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_helpers_fall_back_to_defaults() {
        assert_eq!(parse_env_usize("QR_TEST_UNSET_KNOB", 7), 7);
        assert!(parse_env_bool_u8("QR_TEST_UNSET_KNOB", true));
        assert!(!parse_env_bool_u8("QR_TEST_UNSET_KNOB", false));
    }
}
