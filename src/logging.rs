//! Diagnostic logging to standard error.

use tracing_subscriber::EnvFilter;

/// Environment variable holding an explicit filter, e.g. `cueplan=debug`.
pub const LOG_ENV: &str = "CUEPLAN_LOG";

/// Filter directive for a `-v` count.
pub fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `CUEPLAN_LOG` wins over `-v`.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level_for(verbose)));
    // A subscriber installed earlier (tests) stays in place.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
