//! Logging setup using the `tracing` crate.
//!
//! Logs go to stderr so stdout stays clean for `--print` output.

use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the default log filter.
pub const LOG_ENV_VAR: &str = "ROKU_SYNC_LOG";

/// Initialize the global tracing subscriber. `ROKU_SYNC_LOG` takes
/// precedence over the verbose flag.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
