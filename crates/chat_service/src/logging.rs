//! Tracing setup for binaries embedding the service.

use tracing_subscriber::EnvFilter;

/// Install the default fmt subscriber, honoring `RUST_LOG` and falling back
/// to `info`. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
