//! Diagnostic logging setup.
//!
//! Logs go to stderr so command output on stdout stays clean. `RUST_LOG`
//! takes precedence over `[logging].level`; `--debug` overrides both.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Resolve the filter directive for this run.
fn filter_for(config: &LoggingConfig, debug: bool) -> EnvFilter {
    if debug {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &LoggingConfig, debug: bool) -> Result<()> {
    let filter = filter_for(config, debug);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match config.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.with_target(false).try_init(),
    };
    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}
