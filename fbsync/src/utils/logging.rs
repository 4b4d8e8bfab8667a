//! Logging utilities for fbsync
//!
//! Logs go to stderr so a `--json` summary on stdout stays machine-readable.

use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Initialize the global subscriber. `RUST_LOG` wins over the configured
/// level when it is set.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fbsync={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to initialize logging: {e}")))
}
