//! Log output for the `capture-harness` binary.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Install a stderr `tracing` subscriber. `RUST_LOG` takes precedence over
/// `verbose`, which raises the default level to `debug`.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init(verbose: bool) {
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::new(if verbose { "debug" } else { DEFAULT_FILTER }),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}
