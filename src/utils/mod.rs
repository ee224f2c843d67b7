//! Utilities: logging setup.
//!
//! Key items:
//!   derive_level / init_logging
//!
//! Logs go to stderr; stdout carries call results only.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Map `-v` / `-q` flags to a level. `-q` wins over any `-v`.
pub fn derive_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the flag-derived level.
pub fn init_logging(level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
