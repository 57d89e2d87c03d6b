//! Process-wide logging setup.
//!
//! Engine crates only emit `tracing` events; binaries and test harnesses
//! pick how they are rendered here.

pub mod subscriber;

pub use subscriber::{LogFormat, init_with};

/// JSON logs filtered by `RUST_LOG` (default `info`).
///
/// Safe to call multiple times; only the first call installs a subscriber.
pub fn init() {
    subscriber::init_with(LogFormat::Json, None);
}

/// Human-readable logs routed through the test harness' output capture.
pub fn init_for_tests() {
    subscriber::init_with(LogFormat::Test, Some("debug"));
}
