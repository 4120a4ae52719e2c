//! Logging setup.
//!
//! Logs go to **stderr**; stdout belongs to the host process. Filtering
//! follows `RUST_LOG`, for example:
//!
//! ```bash
//! # Show each sweep decision and existence check
//! RUST_LOG=hemmer_provider_servicebus=debug cargo test -- --nocapture
//!
//! # Only the sweeper
//! RUST_LOG=warn,hemmer_provider_servicebus::sweep=debug ./sweep-runner westeurope
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Build the filter, preferring `RUST_LOG` over `default_level`.
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn try_init_with(default_level: &str) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
        .is_ok()
}

/// Initialize logging at [`DEFAULT_LOG_LEVEL`] unless `RUST_LOG` says otherwise.
///
/// Returns `false` when a global subscriber was already installed, which is
/// the normal case when several tests or sweeps share a process.
pub fn init_logging() -> bool {
    try_init_with(DEFAULT_LOG_LEVEL)
}

/// Like [`init_logging`], with a different fallback level.
///
/// ```ignore
/// hemmer_provider_servicebus::init_logging_with_default("debug");
/// ```
pub fn init_logging_with_default(default_level: &str) -> bool {
    try_init_with(default_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_LEVEL).is_ok());
        assert!(EnvFilter::try_new("hemmer_provider_servicebus=debug").is_ok());
        assert!(EnvFilter::try_new("warn,hemmer_provider_servicebus::sweep=debug").is_ok());
    }

    #[test]
    fn test_second_init_is_harmless() {
        init_logging();
        assert!(!init_logging_with_default("debug"));
    }
}
