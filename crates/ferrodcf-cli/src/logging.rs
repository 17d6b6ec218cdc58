//! `tracing` subscriber setup.
//!
//! Logs go to stderr so stdout only carries command output. `RUST_LOG`, when
//! set, replaces the configured level entirely.

use ferrodcf_core::LogFormat;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Transport crates pinned to `warn` regardless of the base level.
pub const NOISY_MODULES: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls", "governor"];

fn build_filter(log_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(directives(log_level))
}

fn directives(log_level: &str) -> String {
    NOISY_MODULES
        .iter()
        .fold(String::from(log_level), |mut directives, module| {
            directives.push_str(&format!(",{module}=warn"));
            directives
        })
}

/// Installs the global subscriber. Returns `false` when one was already set;
/// that subscriber stays in place.
pub fn init_logging(log_level: &str, log_format: LogFormat) -> bool {
    let subscriber = tracing_subscriber::registry().with(build_filter(log_level));

    let installed = match log_format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_writer(std::io::stderr);
            subscriber.with(fmt_layer).try_init()
        }
        LogFormat::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_target(true)
                .with_writer(std::io::stderr);
            subscriber.with(fmt_layer).try_init()
        }
    };

    match installed {
        Ok(()) => {
            tracing::debug!(log_level, ?log_format, "logging initialized");
            true
        }
        Err(error) => {
            tracing::debug!(%error, "subscriber already installed; keeping it");
            false
        }
    }
}
