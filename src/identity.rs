//! Client identity resolution.
//!
//! Every request is capped and blocked under one string identity: the first
//! entry of the forwarding header when a load balancer supplies it, else the
//! peer socket address. The header is trusted as-is; deployments are expected
//! to sit behind a balancer that controls it.

use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Header consulted before falling back to the socket address.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Resolve the identity for a request.
///
/// Returns `None` only when the header is unusable and no peer address is
/// known, which callers surface as a client error.
pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    if let Some(forwarded) = headers.get(FORWARDED_FOR_HEADER) {
        if let Ok(value) = forwarded.to_str() {
            let first = value.split(',').next().unwrap_or("").trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }
    peer.map(|addr| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "10.0.0.9:51234".parse().unwrap()
    }

    #[test]
    fn forwarding_header_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static("203.0.113.7"));

        assert_eq!(
            resolve(&headers, Some(peer())),
            Some("203.0.113.7".to_string())
        );
    }

    #[test]
    fn first_hop_of_a_chain_is_used() {
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_FOR_HEADER,
            HeaderValue::from_static("203.0.113.7, 198.51.100.2"),
        );

        assert_eq!(
            resolve(&headers, Some(peer())),
            Some("203.0.113.7".to_string())
        );
    }

    #[test]
    fn blank_header_falls_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static("  "));

        assert_eq!(resolve(&headers, Some(peer())), Some("10.0.0.9".to_string()));
    }

    #[test]
    fn peer_used_when_header_absent() {
        let headers = HeaderMap::new();
        assert_eq!(resolve(&headers, Some(peer())), Some("10.0.0.9".to_string()));
    }

    #[test]
    fn no_source_resolves_to_none() {
        let headers = HeaderMap::new();
        assert_eq!(resolve(&headers, None), None);
    }
}
