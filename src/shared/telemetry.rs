//! Tracing setup for binaries and tests.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "onboarding_sync=info";

/// Install a formatted subscriber honouring `RUST_LOG`.
///
/// Returns `false` when a global subscriber was already installed, which
/// happens when several tests initialise logging in the same process.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
