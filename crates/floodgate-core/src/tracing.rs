//! Tracing setup for the floodgate binary.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Directives used when `RUST_LOG` is unset. Per-statement driver logs are noisy.
const DEFAULT_DIRECTIVES: &str = "info,sqlx=warn";

/// Install the global subscriber, logging to stderr.
///
/// Filtering follows `RUST_LOG`. Calling this twice is a no-op.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .with(filter)
        .try_init();
}
