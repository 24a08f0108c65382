//! JSON-RPC Provider Proxy
//!
//! A rate-limiting reverse proxy for JSON-RPC providers, built with Tokio
//! and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────────┐
//!                        │                  PROVIDER PROXY                   │
//!                        │                                                   │
//!     Client Request     │  ┌──────────┐    ┌───────────┐    ┌──────────┐   │
//!     ───────────────────┼─▶│ throttle │───▶│ admission │───▶│   auth   │   │
//!                        │  │ (bucket) │    │ (IP caps) │    │ (bearer) │   │
//!                        │  └──────────┘    └─────┬─────┘    └────┬─────┘   │
//!                        │                        │               │         │
//!                        │                        ▼               ▼         │
//!                        │                  ┌──────────┐    ┌──────────┐    │
//!                        │                  │  notify  │    │  relay   │────┼──▶ Upstream
//!                        │                  │ (Slack)  │    │ (hyper)  │    │    provider
//!                        │                  └──────────┘    └────┬─────┘    │
//!     Client Response    │  ┌──────────┐                         │          │
//!     ◀──────────────────┼──│   CORS   │◀────────────────────────┘          │
//!                        │  │ rewrite  │                                    │
//!                        │  └──────────┘                                    │
//!                        │                                                  │
//!                        │  ┌─────────────────────────────────────────────┐ │
//!                        │  │            Cross-Cutting Concerns           │ │
//!                        │  │   config     observability     lifecycle    │ │
//!                        │  └─────────────────────────────────────────────┘ │
//!                        └───────────────────────────────────────────────────┘
//! ```
//!
//! Every inbound request pays the global throttle, resolves a client
//! identity, passes the per-IP cap check and optional bearer auth, and is
//! then relayed verbatim to the configured upstream. Cap crossings fire
//! Slack-compatible webhook alerts; hard-capped clients get 429 with a
//! retry estimate until their window expires.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use rpc_provider_proxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use rpc_provider_proxy::lifecycle::{signals, Shutdown};
use rpc_provider_proxy::observability::{logging, metrics};
use rpc_provider_proxy::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "rpc-provider-proxy", version)]
#[command(about = "Rate-limiting reverse proxy for JSON-RPC providers", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listener port (overrides the configured bind address)
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Upstream provider URL
    #[arg(long)]
    proxy_url: Option<String>,

    /// HTTP method the proxy accepts and forwards
    #[arg(long)]
    proxy_method: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long)]
    log_level: Option<String>,

    /// Shared bearer secret; empty disables authorization
    #[arg(long, env = "AUTH_SECRET")]
    auth_secret: Option<String>,

    /// Requests per second let through the global throttle
    #[arg(long)]
    limit_per_second: Option<u32>,

    /// Per-IP requests per minute before a warning alert
    #[arg(long)]
    soft_cap_per_minute: Option<u32>,

    /// Per-IP requests per minute before rejection
    #[arg(long)]
    hard_cap_per_minute: Option<u32>,

    /// Slack-compatible webhook URL for cap alerts; empty disables alerts
    #[arg(long, env = "SLACK_WEBHOOK_URL")]
    slack_webhook_url: Option<String>,

    /// Channel the webhook posts to
    #[arg(long)]
    slack_channel: Option<String>,
}

/// Overlay CLI flags on the file/default configuration. Flags win.
fn apply_cli(config: &mut ProxyConfig, cli: &Cli) {
    if let Some(port) = cli.port {
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }
    if let Some(url) = &cli.proxy_url {
        config.upstream.url = url.clone();
    }
    if let Some(method) = &cli.proxy_method {
        config.upstream.method = method.clone();
    }
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }
    if let Some(secret) = &cli.auth_secret {
        // Empty AUTH_SECRET means authorization stays off
        config.auth.secret = if secret.is_empty() {
            None
        } else {
            Some(secret.clone())
        };
    }
    if let Some(limit) = cli.limit_per_second {
        config.admission.limit_per_second = limit;
    }
    if let Some(cap) = cli.soft_cap_per_minute {
        config.admission.soft_cap_per_minute = cap;
    }
    if let Some(cap) = cli.hard_cap_per_minute {
        config.admission.hard_cap_per_minute = cap;
    }
    if let Some(url) = &cli.slack_webhook_url {
        config.notifier.webhook_url = if url.is_empty() {
            None
        } else {
            Some(url.clone())
        };
    }
    if let Some(channel) = &cli.slack_channel {
        config.notifier.channel = channel.clone();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Layer configuration: defaults, then file, then flags/env
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    apply_cli(&mut config, &cli);

    // Logging first, so every later step can report
    logging::init_logging(&config.observability.log_level);

    tracing::info!("rpc-provider-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(%error, "Invalid configuration");
        }
        return Err(ConfigError::Validation(errors).into());
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        log_level = %config.observability.log_level,
        auth_enabled = config.auth.secret.is_some(),
        alerts_enabled = config.notifier.webhook_url.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .expect("metrics address validated at startup");
        metrics::init_metrics(addr);
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    let server = HttpServer::new(config);
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
