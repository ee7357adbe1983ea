// Logging module for structured logging using the tracing crate

use std::error::Error;
use tracing_subscriber::EnvFilter;

/// Default filter directive when `RUST_LOG` is not set
const DEFAULT_LOG_FILTER: &str = "info";

/// Initialize the tracing subscriber for structured logging
///
/// The subscriber is configured with:
/// - JSON formatting for easy parsing by log aggregation systems
/// - Filtering from `RUST_LOG`, defaulting to `info`
/// - Output to stdout for container/cloud-native deployments
///
/// Calling this more than once is harmless: the first subscriber stays
/// installed and later calls return `Ok(())`.
///
/// # Examples
///
/// ```
/// use s3imageserver::logging::init_subscriber;
///
/// init_subscriber().expect("Failed to initialize logging");
/// tracing::info!("Application started");
/// ```
pub fn init_subscriber() -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))?;

    let result = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(true)
        .with_current_span(false)
        .try_init();

    // A global subscriber already being set is not an error for us
    if result.is_err() {
        tracing::debug!("Tracing subscriber already initialized");
    }

    Ok(())
}
