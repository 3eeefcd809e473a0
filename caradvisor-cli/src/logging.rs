//! Tracing setup for the CLI. Logs go to stderr so command output stays clean.

use shared::config::{LogFormat, LoggingConfig};
use std::io;
use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt};

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn initialize_tracing(config: &LoggingConfig) {
    let fmt_builder = fmt::fmt()
        .with_env_filter(build_env_filter(config))
        .with_target(false)
        .with_level(true)
        .with_writer(io::stderr);

    let installed = if matches!(config.format, LogFormat::Json) {
        fmt_builder.json().with_ansi(false).try_init()
    } else {
        fmt_builder.with_ansi(true).try_init()
    };
    // A subscriber may already be installed.
    installed.ok();
}

fn default_level(config: &LoggingConfig) -> LevelFilter {
    config
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO)
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level(config).into())
            .from_env_lossy()
    })
}
