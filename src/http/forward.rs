//! Forwarding pipeline.
//!
//! # Responsibilities
//! - Apply the ordered per-request checks: global pacing, identity, caps,
//!   authorization, preflight, method gate
//! - Relay accepted requests to the single configured upstream
//! - Rewrite headers so the upstream sees a canonical JSON request
//!
//! # Design Decisions
//! - The pipeline is linear with early exits; nothing is retried
//! - Rejection bodies stay empty except the hard-cap retry hint and the
//!   method gate, so no internal detail leaks
//! - The relay reports 200 whenever the upstream round trip completed,
//!   whatever status the upstream returned (long-standing client-facing
//!   behavior, pinned by tests)

use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    response::Response,
};
use base64::{engine::general_purpose, Engine as _};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::time::timeout;

use crate::admission::{retry_after_secs, Decision};
use crate::http::cors;
use crate::http::server::AppState;
use crate::identity;
use crate::observability::metrics;

/// The catch-all handler: every request that is not `/ping` or `/health`
/// goes through here.
pub async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();

    // 1. Global pacing, then a session id and an identity for this request
    state.throttle.acquire().await;
    let session = state.sessions.next();

    let method = request.method().clone();
    let method_str = method.to_string();

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let Some(client) = identity::resolve(request.headers(), peer) else {
        tracing::error!(session, "client identity could not be resolved");
        metrics::record_rejection("bad_identity");
        metrics::record_request(&method_str, 400, start_time);
        return empty_status(StatusCode::BAD_REQUEST);
    };

    let origin = request.headers().get(header::ORIGIN).cloned();
    let origin_str = origin
        .as_ref()
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();

    // 2. Blocked list and per-client caps
    match state.engine.check_and_record(&client, &origin_str, session) {
        Decision::Allow => {}
        Decision::Blocked => {
            tracing::error!(session, client = %client, "blocked ip rejected");
            metrics::record_request(&method_str, 429, start_time);
            return empty_status(StatusCode::TOO_MANY_REQUESTS);
        }
        Decision::CapExceeded { retry_after } => {
            let secs = retry_after_secs(retry_after);
            tracing::error!(
                session,
                client = %client,
                retry_after_secs = secs,
                "hard cap rejected"
            );
            metrics::record_request(&method_str, 429, start_time);
            return with_body(
                StatusCode::TOO_MANY_REQUESTS,
                format!(
                    "Too many requests: Rate limit exceeded. Try again in {}s",
                    secs
                ),
            );
        }
    }

    // 3. Bearer authorization when a secret is configured
    if let Some(secret) = &state.config.auth.secret {
        if let Err(reason) = check_bearer(request.headers(), secret) {
            tracing::error!(session, client = %client, reason, "unauthorized");
            metrics::record_rejection("auth");
            metrics::record_request(&method_str, 401, start_time);
            return empty_status(StatusCode::UNAUTHORIZED);
        }
    }

    // 4. CORS preflights never reach the upstream
    if method == Method::OPTIONS {
        metrics::record_request(&method_str, 204, start_time);
        return cors::preflight_response(origin.as_ref());
    }

    // 5. Single-method gate
    if method != state.upstream_method {
        tracing::debug!(session, method = %method, "method not supported");
        metrics::record_rejection("method");
        metrics::record_request(&method_str, 404, start_time);
        return with_body(StatusCode::NOT_FOUND, "Not supported".to_string());
    }

    // 6. Capture the body once; the same bytes are logged and relayed
    let (parts, body) = request.into_parts();
    let body_bytes = match to_bytes(body, state.config.listener.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(session, client = %client, error = %err, "request body read failed");
            metrics::record_request(&method_str, 500, start_time);
            return empty_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    tracing::debug!(
        session,
        client = %client,
        method = %parts.method,
        uri = %parts.uri,
        body = %String::from_utf8_lossy(&body_bytes),
        "relaying request"
    );

    // 7. Outbound request: same method, fixed upstream URL, rewritten headers
    let mut builder = Request::builder()
        .method(parts.method.clone())
        .uri(state.upstream_uri.clone());
    if let Some(headers) = builder.headers_mut() {
        for (name, value) in parts.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
        // the client fills Host from the upstream URL; the inbound value
        // must not leak through
        headers.remove(header::HOST);
        headers.remove(header::TRANSFER_ENCODING);
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        // an explicit length defeats chunked transfer encoding, which some
        // providers reject
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body_bytes.len()));
    }

    let outbound = match builder.body(Body::from(body_bytes)) {
        Ok(outbound) => outbound,
        Err(err) => {
            tracing::error!(session, client = %client, error = %err, "upstream request build failed");
            metrics::record_request(&method_str, 500, start_time);
            return empty_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    let outbound_origin = outbound.headers().get(header::ORIGIN).cloned();

    let response = match timeout(state.upstream_timeout, state.client.request(outbound)).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            tracing::error!(session, client = %client, error = %err, "upstream request failed");
            metrics::record_upstream_error();
            metrics::record_request(&method_str, 500, start_time);
            return empty_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
        Err(_) => {
            tracing::error!(session, client = %client, "upstream request timed out");
            metrics::record_upstream_error();
            metrics::record_request(&method_str, 500, start_time);
            return empty_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    // 8. Read the upstream response fully and relay it as a success
    let upstream_status = response.status();
    let (response_parts, response_body) = response.into_parts();
    let response_bytes = match to_bytes(Body::new(response_body), usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(session, client = %client, error = %err, "upstream body read failed");
            metrics::record_upstream_error();
            metrics::record_request(&method_str, 500, start_time);
            return empty_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    tracing::debug!(
        session,
        client = %client,
        status = upstream_status.as_u16(),
        body = %String::from_utf8_lossy(&response_bytes),
        "relaying response"
    );

    let mut client_response = Response::new(Body::from(response_bytes));
    *client_response.status_mut() = StatusCode::OK;
    let headers = client_response.headers_mut();
    for (name, value) in response_parts.headers.iter() {
        headers.insert(name.clone(), value.clone());
    }
    headers.remove(header::TRANSFER_ENCODING);
    cors::overwrite_relay_headers(headers, outbound_origin.as_ref());

    metrics::record_request(&method_str, 200, start_time);
    client_response
}

/// Validate `Authorization: Bearer <base64 of secret>`.
///
/// The error string feeds the log line only; clients always see a bare 401.
fn check_bearer(headers: &HeaderMap, secret: &str) -> Result<(), &'static str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    let Some(token) = value.strip_prefix("Bearer") else {
        return Err("auth token is required");
    };
    let decoded = general_purpose::STANDARD
        .decode(token.trim())
        .map_err(|_| "auth token is not valid base64")?;
    if decoded != secret.as_bytes() {
        return Err("auth token mismatch");
    }
    Ok(())
}

fn empty_status(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

fn with_body(status: StatusCode, body: String) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}
