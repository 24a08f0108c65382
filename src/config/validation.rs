//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rate and caps nonzero, soft at most hard)
//! - Check addresses and URLs parse into the types the runtime needs
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function over the assembled config
//! - Runs after CLI and file layering, before anything is constructed

use axum::http::{Method, Uri};
use std::net::SocketAddr;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingUpstreamUrl,
    InvalidUpstreamUrl(String),
    UnsupportedUpstreamScheme(String),
    InvalidUpstreamMethod(String),
    InvalidBindAddress(String),
    InvalidMetricsAddress(String),
    InvalidWebhookUrl(String),
    EmptyAuthSecret,
    ZeroRateLimit,
    ZeroSoftCap,
    ZeroHardCap,
    SoftCapAboveHardCap { soft: u32, hard: u32 },
    ZeroWindow,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingUpstreamUrl => {
                write!(f, "upstream.url is required")
            }
            ValidationError::InvalidUpstreamUrl(url) => {
                write!(f, "upstream.url {:?} does not parse", url)
            }
            ValidationError::UnsupportedUpstreamScheme(scheme) => {
                write!(f, "upstream.url scheme {:?} is not http or https", scheme)
            }
            ValidationError::InvalidUpstreamMethod(method) => {
                write!(f, "upstream.method {:?} is not a valid HTTP method", method)
            }
            ValidationError::InvalidBindAddress(addr) => {
                write!(f, "listener.bind_address {:?} is not a socket address", addr)
            }
            ValidationError::InvalidMetricsAddress(addr) => {
                write!(
                    f,
                    "observability.metrics_address {:?} is not a socket address",
                    addr
                )
            }
            ValidationError::InvalidWebhookUrl(url) => {
                write!(f, "notifier.webhook_url {:?} does not parse", url)
            }
            ValidationError::EmptyAuthSecret => {
                write!(f, "auth.secret is empty; unset it to disable authorization")
            }
            ValidationError::ZeroRateLimit => {
                write!(f, "admission.limit_per_second must be nonzero")
            }
            ValidationError::ZeroSoftCap => {
                write!(f, "admission.soft_cap_per_minute must be nonzero")
            }
            ValidationError::ZeroHardCap => {
                write!(f, "admission.hard_cap_per_minute must be nonzero")
            }
            ValidationError::SoftCapAboveHardCap { soft, hard } => {
                write!(
                    f,
                    "admission.soft_cap_per_minute ({}) exceeds hard_cap_per_minute ({})",
                    soft, hard
                )
            }
            ValidationError::ZeroWindow => {
                write!(f, "admission.window_secs must be nonzero")
            }
        }
    }
}

/// Check every semantic rule, collecting all violations.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.upstream.url.is_empty() {
        errors.push(ValidationError::MissingUpstreamUrl);
    } else {
        match Url::parse(&config.upstream.url) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    errors.push(ValidationError::UnsupportedUpstreamScheme(
                        url.scheme().to_string(),
                    ));
                }
                // hyper's client needs the same string as a Uri
                if config.upstream.url.parse::<Uri>().is_err() {
                    errors.push(ValidationError::InvalidUpstreamUrl(
                        config.upstream.url.clone(),
                    ));
                }
            }
            Err(_) => {
                errors.push(ValidationError::InvalidUpstreamUrl(
                    config.upstream.url.clone(),
                ));
            }
        }
    }

    let method = config.upstream.method.to_ascii_uppercase();
    if Method::from_bytes(method.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidUpstreamMethod(
            config.upstream.method.clone(),
        ));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if let Some(url) = &config.notifier.webhook_url {
        match Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
            _ => errors.push(ValidationError::InvalidWebhookUrl(url.clone())),
        }
    }

    if let Some(secret) = &config.auth.secret {
        if secret.is_empty() {
            errors.push(ValidationError::EmptyAuthSecret);
        }
    }

    if config.admission.limit_per_second == 0 {
        errors.push(ValidationError::ZeroRateLimit);
    }
    if config.admission.soft_cap_per_minute == 0 {
        errors.push(ValidationError::ZeroSoftCap);
    }
    if config.admission.hard_cap_per_minute == 0 {
        errors.push(ValidationError::ZeroHardCap);
    }
    if config.admission.soft_cap_per_minute > config.admission.hard_cap_per_minute {
        errors.push(ValidationError::SoftCapAboveHardCap {
            soft: config.admission.soft_cap_per_minute,
            hard: config.admission.hard_cap_per_minute,
        });
    }
    if config.admission.window_secs == 0 {
        errors.push(ValidationError::ZeroWindow);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
