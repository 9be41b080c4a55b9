/*!
 * Logging setup for the mirrorsync binary
 */

use std::io;

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Result, SyncError};

/// Install a stderr subscriber; `RUST_LOG` takes precedence over `level`
pub fn init_logging(level: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| SyncError::Config(format!("failed to install logger: {e}")))
}
