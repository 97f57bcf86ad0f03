//! Logging setup

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "warn,avif_sweep=info";

/// Load `.env` and install the tracing subscriber.
///
/// `RUST_LOG` wins over everything; otherwise `verbose` raises this crate to
/// debug. Logs go to stderr so stdout stays machine-readable.
pub fn init(verbose: bool) {
    // Current dir first, then the parent (running from a nested checkout)
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path("../.env");
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    // Already installed (tests, embedding) is fine
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "warn,avif_sweep=debug"
    } else {
        DEFAULT_FILTER
    }
}
