//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;

use rpc_provider_proxy::config::ProxyConfig;
use rpc_provider_proxy::lifecycle::Shutdown;
use rpc_provider_proxy::HttpServer;

/// One request observed by the mock upstream.
#[derive(Clone, Debug)]
pub struct SeenRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Programmable mock upstream: captures every request, answers with a
/// configurable status and body plus an `x-upstream-id` marker header.
pub struct MockUpstream {
    pub seen: Mutex<Vec<SeenRequest>>,
    pub status: Mutex<StatusCode>,
    pub body: Mutex<String>,
}

impl MockUpstream {
    pub fn request_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn set_response(&self, status: StatusCode, body: &str) {
        *self.status.lock().unwrap() = status;
        *self.body.lock().unwrap() = body.to_string();
    }
}

async fn upstream_handler(
    State(state): State<Arc<MockUpstream>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    state.seen.lock().unwrap().push(SeenRequest {
        method,
        uri,
        headers,
        body,
    });
    let status = *state.status.lock().unwrap();
    let body = state.body.lock().unwrap().clone();
    (
        status,
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::HeaderName::from_static("x-upstream-id"), "mock"),
        ],
        body,
    )
}

/// Start the mock upstream on an ephemeral loopback port.
pub async fn start_mock_upstream() -> (SocketAddr, Arc<MockUpstream>) {
    let state = Arc::new(MockUpstream {
        seen: Mutex::new(Vec::new()),
        status: Mutex::new(StatusCode::OK),
        body: Mutex::new(r#"{"jsonrpc":"2.0","id":1,"result":"0x0"}"#.to_string()),
    });

    let app = Router::new()
        .route("/", any(upstream_handler))
        .route("/{*path}", any(upstream_handler))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Captures webhook deliveries and answers the body the notifier expects.
pub struct WebhookSink {
    pub payloads: Mutex<Vec<serde_json::Value>>,
}

impl WebhookSink {
    pub fn texts(&self) -> Vec<String> {
        self.payloads
            .lock()
            .unwrap()
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()).map(String::from))
            .collect()
    }
}

async fn webhook_handler(
    State(state): State<Arc<WebhookSink>>,
    axum::Json(payload): axum::Json<serde_json::Value>,
) -> &'static str {
    state.payloads.lock().unwrap().push(payload);
    "ok"
}

/// Start the webhook sink on an ephemeral loopback port.
pub async fn start_webhook_sink() -> (SocketAddr, Arc<WebhookSink>) {
    let state = Arc::new(WebhookSink {
        payloads: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/", any(webhook_handler))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Default proxy configuration pointed at the given upstream.
pub fn proxy_config(upstream: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.upstream.url = format!("http://{}/", upstream);
    config
}

/// Bind the proxy on an ephemeral port and run it until shutdown.
pub async fn start_proxy(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(config);
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    // Give the accept loop a beat before tests fire requests
    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, shutdown)
}

/// Client that never picks up environment proxy settings.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
