//! Diagnostic logging to stderr.
//!
//! `RUST_LOG` wins when set; otherwise the level follows `-v` count.
//! Results and build summaries go to stdout and never through here.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter directive for a `-v` count.
pub fn filter_for(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn,blog_search=info,blog_search_core=info",
        1 => "info,blog_search=debug,blog_search_core=debug",
        2 => "debug,blog_search=trace,blog_search_core=trace",
        _ => "trace",
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(verbose: u8, quiet: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_for(verbose, quiet)));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}
