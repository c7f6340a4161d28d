//! Tracing setup shared by the library's consumers.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging at INFO, overridable with `RUST_LOG`.
pub fn init() {
    init_with_level("info")
}

/// Initialize logging with a specific default level.
///
/// `RUST_LOG` still wins when set. Output goes to stderr so JSON printed on
/// stdout stays machine-readable. Calling this twice is a no-op.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init();
}

/// Initialize logging for tests (captured by the test harness).
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
