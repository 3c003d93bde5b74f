use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install a tracing subscriber for the current test binary.
///
/// Output goes through the test writer so it is captured per test. The level
/// comes from `RUST_LOG`, defaulting to "info". Calling this more than once
/// is harmless; only the first call installs anything.
pub fn init() {
    let fmt_layer = fmt::layer()
        .with_test_writer()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, info};

    #[test]
    fn test_logging_init_twice() {
        init();
        init();

        info!("This is an info message");
        debug!(path = "/tmp/x", "This is a debug message");
    }
}
