//! Structured logging with `tracing`.
//!
//! - [`init_subscriber`] installs a compact human-readable subscriber on stderr
//! - [`init_json_subscriber`] installs a JSON-lines subscriber on stderr
//! - [`capture_logs`] installs a thread-local capturing subscriber for tests
//!
//! Both initializers honour `RUST_LOG` when it is set and fall back to the
//! configured level otherwise. Calling either more than once is a no-op.

pub mod test_utils;

pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

use tracing_subscriber::EnvFilter;

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the global tracing subscriber with compact stderr output.
///
/// # Arguments
///
/// * `level` - Minimum log level when `RUST_LOG` is unset (e.g. `"info"`).
pub fn init_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // no-op if a global subscriber is already installed
    let _ = subscriber.try_init();
}

/// Initialize the global tracing subscriber with JSON-lines stderr output.
pub fn init_json_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .with_current_span(true);

    let _ = subscriber.try_init();
}
