//! Tracing subscriber setup.
//!
//! The bridge itself only emits `tracing` events; installing a subscriber is
//! left to the embedding service. These helpers cover the common cases and are
//! no-ops unless the `logging` feature is enabled.

#[cfg(feature = "logging")]
use tracing_subscriber::{EnvFilter, fmt};

/// Default filter directive when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "surreal_bridge=info";

/// Install a global fmt subscriber filtered by `RUST_LOG`, falling back to
/// [`DEFAULT_DIRECTIVE`].
#[cfg(feature = "logging")]
pub fn init() {
    init_with_level(DEFAULT_DIRECTIVE)
}

/// Install a global fmt subscriber with `directive` as the fallback filter.
///
/// Returns silently if a subscriber is already installed.
///
/// ```rust
/// surreal_bridge::logging::init_with_level("surreal_bridge=debug");
/// ```
#[cfg(feature = "logging")]
pub fn init_with_level(directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init();
}

/// Verbose subscriber writing through the test harness capture.
#[cfg(feature = "logging")]
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("surreal_bridge=trace"))
        .with_test_writer()
        .try_init();
}

#[cfg(not(feature = "logging"))]
pub fn init() {}

#[cfg(not(feature = "logging"))]
pub fn init_with_level(_directive: &str) {}

#[cfg(not(feature = "logging"))]
pub fn init_test() {}
