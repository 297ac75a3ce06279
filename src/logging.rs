//! Log setup for the command-line tool.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set. Output is human readable on a terminal and
/// JSON lines otherwise, always on stderr so stdout stays free for tables.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if std::io::stderr().is_terminal() {
        builder.init();
    } else {
        builder.json().init();
    }
}
