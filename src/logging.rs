//! Structured logging setup for the demo binary.
//!
//! `tracing_subscriber::registry().with(EnvFilter)...`, JSON in non-dev
//! profiles. No log-shipping integration here; that belongs to the host
//! deploying this binary, not the cache library.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global `tracing` subscriber. JSON output in non-dev
/// profiles (anything but `RUST_ENV=dev`), human-readable otherwise.
pub fn init_logging() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_output = std::env::var("RUST_ENV").as_deref() != Ok("dev");

    let registry = tracing_subscriber::registry().with(env_filter);

    if json_output {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    Ok(())
}
