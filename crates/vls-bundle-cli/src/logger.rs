//! Logging setup for the `vls-bundle` executable.
//!
//! The library only emits `tracing` events; this installs the subscriber.
//! Level selection, in order:
//! 1. `VLS_VERBOSE`: debug for the vls crates
//! 2. `VLS_QUIET`: errors only
//! 3. `RUST_LOG`: custom filter
//! 4. info for the vls crates

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const VERBOSE_FILTER: &str = "vls_bundle=debug,vls_bundle_cli=debug";
const QUIET_FILTER: &str = "vls_bundle=error,vls_bundle_cli=error";
const DEFAULT_FILTER: &str = "vls_bundle=info,vls_bundle_cli=info";

/// Build the filter for the given verbosity flags. `verbose` wins over `quiet`.
pub fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Initialize the global tracing subscriber. Call once, before any logging.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .compact();

    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter_for(verbose, quiet))
        .with(fmt_layer)
        .try_init();
}
