//! CORS response shaping.
//!
//! The proxy answers preflights itself and stamps a fixed CORS policy onto
//! every relayed response. The header values are constants; only the echoed
//! origin varies per request.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;

pub const ALLOW_HEADERS: &str = "Authorization,Accept,Origin,DNT,X-CustomHeader,Keep-Alive,User-Agent,X-Requested-With,If-Modified-Since,Cache-Control,Content-Type,Content-Range,Range";
pub const ALLOW_METHODS: &str = "GET,POST,OPTIONS,PUT,DELETE,PATCH";
pub const MAX_AGE: &str = "1728000";

fn origin_value(origin: Option<&HeaderValue>) -> HeaderValue {
    origin.cloned().unwrap_or_else(|| HeaderValue::from_static(""))
}

/// Synthesize the preflight answer; preflights never reach the upstream.
pub fn preflight_response(origin: Option<&HeaderValue>) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin_value(origin));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(MAX_AGE),
    );
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain charset=UTF-8"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
    response
}

/// Replace whatever CORS headers the upstream sent with the proxy's policy.
///
/// Credentials are never allowed through; the origin is echoed, not
/// validated.
pub fn overwrite_relay_headers(headers: &mut HeaderMap, origin: Option<&HeaderValue>) {
    headers.remove(header::ACCESS_CONTROL_ALLOW_CREDENTIALS);
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin_value(origin));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preflight_echoes_origin_and_policy() {
        let origin = HeaderValue::from_static("https://dapp.example.com");
        let response = preflight_response(Some(&origin));

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://dapp.example.com"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], ALLOW_HEADERS);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS);
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], MAX_AGE);
    }

    #[test]
    fn preflight_without_origin_sends_empty_allow_origin() {
        let response = preflight_response(None);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "");
    }

    #[test]
    fn relay_overwrite_strips_credentials_and_replaces_policy() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );

        let origin = HeaderValue::from_static("https://dapp.example.com");
        overwrite_relay_headers(&mut headers, Some(&origin));

        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://dapp.example.com"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], ALLOW_HEADERS);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS);
        // relayed responses carry no max-age; only preflights do
        assert!(headers.get(header::ACCESS_CONTROL_MAX_AGE).is_none());
    }
}
