//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Derive the default filter from the configured log level
//!
//! # Design Decisions
//! - `RUST_LOG` always wins over the configured level, so operators can
//!   turn up verbosity without touching the config file

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
///
/// `log_level` comes from configuration ("trace" through "error") and
/// scopes the crate and `tower_http`; other crates stay at warn.
pub fn init_logging(log_level: &str) {
    let default_filter = format!(
        "warn,rpc_provider_proxy={level},tower_http={level}",
        level = log_level
    );

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
