use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is unset or unparsable
pub const DEFAULT_FILTER: &str = "info";

fn filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { "qr_sentinel=debug,info" } else { DEFAULT_FILTER };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the global subscriber: compact lines on stderr, filtered by
/// `RUST_LOG`. Calling it again is a no-op.
pub fn init(verbose: bool) {
    let result = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .compact(),
        )
        .with(filter(verbose))
        .try_init();
    if result.is_ok() {
        tracing::debug!("logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice() {
        init(false);
        init(true);
        tracing::info!("still alive");
    }
}
