//! Tracing setup for the CLI.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "GOLDRUN_LOG";

/// Installs a stderr subscriber. `GOLDRUN_LOG` wins over `verbose`.
pub fn init(verbose: bool) {
    let default = if verbose { "goldrun=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
