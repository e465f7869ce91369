// src/infra/logger.rs — Structured logging with tracing
//
// Logs go to stderr so CLI output on stdout (recipe lists, transcripts)
// stays clean for piping.

use tracing_subscriber::{fmt, EnvFilter};

/// Env var checked before `RUST_LOG`.
pub const LOG_ENV: &str = "STEPCHEF_LOG";

/// Install the global subscriber. `STEPCHEF_LOG`, then `RUST_LOG`, win over
/// `default_level`.
pub fn init_logging(default_level: &str) {
    fmt()
        .with_env_filter(build_filter(default_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}
