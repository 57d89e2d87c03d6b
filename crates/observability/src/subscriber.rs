use tracing_subscriber::EnvFilter;

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, with timestamps.
    Json,
    /// Compact text captured by `cargo test`.
    Test,
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_directive`; without either, `info` is used.
/// Returns whether this call installed the subscriber.
pub fn init_with(format: LogFormat, default_directive: Option<&str>) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive.unwrap_or("info")));

    let installed = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .try_init(),
        LogFormat::Test => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .with_test_writer()
            .try_init(),
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_installation_is_a_no_op() {
        init_with(LogFormat::Test, Some("warn"));
        assert!(!init_with(LogFormat::Json, None));
    }
}
