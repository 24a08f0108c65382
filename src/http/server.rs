//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: liveness, health, and the catch-all pipeline
//! - Build the shared per-request state (engine, throttle, upstream client)
//! - Bind the server to a listener and serve until shutdown
//! - Probe the proxy's own forwarding path for the health endpoint

use axum::{
    body::Body,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::admission::throttle::LeakyBucket;
use crate::admission::AdmissionEngine;
use crate::config::ProxyConfig;
use crate::http::forward::forward_handler;
use crate::notify::Notifier;

/// Monotonic id correlating the log lines of one request.
pub struct SessionCounter(AtomicU64);

impl SessionCounter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for SessionCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub engine: Arc<AdmissionEngine>,
    pub throttle: Arc<LeakyBucket>,
    pub sessions: Arc<SessionCounter>,
    pub client: Client<HttpConnector, Body>,
    pub upstream_uri: Uri,
    pub upstream_method: Method,
    pub upstream_timeout: Duration,
    pub health_client: reqwest::Client,
    pub local_port: u16,
}

impl AppState {
    /// Assemble runtime state from validated configuration. `local_port` is
    /// where the listener actually bound; the health probe loops back to it.
    fn new(config: Arc<ProxyConfig>, local_port: u16) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let upstream_uri: Uri = config
            .upstream
            .url
            .parse()
            .expect("upstream url validated at startup");
        let upstream_method = Method::from_bytes(
            config.upstream.method.to_ascii_uppercase().as_bytes(),
        )
        .expect("upstream method validated at startup");
        let upstream_host = upstream_uri.host().unwrap_or_default().to_string();

        let notifier = Arc::new(Notifier::new(&config.notifier));
        let engine = Arc::new(AdmissionEngine::new(
            &config.admission,
            upstream_host,
            notifier,
        ));
        let throttle = Arc::new(LeakyBucket::new(config.admission.limit_per_second));
        let upstream_timeout = Duration::from_secs(config.upstream.timeout_secs);

        Self {
            config,
            engine,
            throttle,
            sessions: Arc::new(SessionCounter::new()),
            client,
            upstream_uri,
            upstream_method,
            upstream_timeout,
            health_client: reqwest::Client::new(),
            local_port,
        }
    }
}

/// HTTP server for the RPC provider proxy.
pub struct HttpServer {
    config: Arc<ProxyConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Build the Axum router with all routes and middleware.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/ping", get(ping_handler))
            .route("/health", get(health_handler).post(health_handler))
            .route("/{*path}", any(forward_handler))
            .route("/", any(forward_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server on the given listener until the shutdown signal.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let local_addr = listener.local_addr()?;
        let state = AppState::new(self.config.clone(), local_addr.port());

        tracing::info!(
            method = %state.upstream_method,
            url = %self.config.upstream.url,
            "proxying upstream"
        );
        tracing::info!(address = %local_addr, "listening for connections");
        tracing::info!(
            limit_per_second = self.config.admission.limit_per_second,
            soft_cap = self.config.admission.soft_cap_per_minute,
            hard_cap = self.config.admission.hard_cap_per_minute,
            window_secs = self.config.admission.window_secs,
            "admission control active"
        );

        // Expired window entries are reclaimed in the background
        let sweeper_engine = state.engine.clone();
        let sweeper_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            sweeper_engine.run_sweeper(sweeper_shutdown).await;
        });

        let app = Self::build_router(state).into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Liveness: answers without touching the pipeline or the upstream.
async fn ping_handler() -> &'static str {
    "pong"
}

/// Health: a JSON-RPC probe through the proxy's own forwarding path, so the
/// whole pipeline and the upstream are exercised, not just the listener.
async fn health_handler(State(state): State<AppState>) -> Response {
    let url = format!("http://127.0.0.1:{}/", state.local_port);
    let probe = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "web3_clientVersion",
        "params": [],
        "id": 42,
    });

    match state.health_client.post(&url).json(&probe).send().await {
        Ok(response) if response.status() == reqwest::StatusCode::OK => {
            (StatusCode::OK, "OK").into_response()
        }
        Ok(response) => {
            let status = StatusCode::from_u16(response.status().as_u16())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            tracing::warn!(status = status.as_u16(), "health probe returned failure");
            (
                status,
                format!("Health check error: got status code {}", status.as_u16()),
            )
                .into_response()
        }
        Err(err) => {
            tracing::warn!(error = %err, "health probe failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Health check error: {}", err),
            )
                .into_response()
        }
    }
}
