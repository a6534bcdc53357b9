//! Process-wide tracing setup.

pub mod logging;

pub use logging::{LogFormat, LoggingConfig};

/// Initialize JSON logging filtered by `RUST_LOG` (default `info`).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    logging::init(&LoggingConfig::default());
}
