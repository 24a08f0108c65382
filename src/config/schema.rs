//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so a minimal config only needs the upstream URL.

use serde::{Deserialize, Serialize};

/// Root configuration for the RPC provider proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// The single upstream endpoint requests are relayed to.
    pub upstream: UpstreamConfig,

    /// Global throttle and per-client cap settings.
    pub admission: AdmissionConfig,

    /// Bearer-token authorization.
    pub auth: AuthConfig,

    /// Webhook alert delivery.
    pub notifier: NotifierConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Maximum inbound body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Upstream endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream URL (required; there is no usable default).
    pub url: String,

    /// The single HTTP method relayed end to end.
    pub method: String,

    /// Upstream call timeout in seconds. Deliberately generous: the proxy
    /// tolerates long-polling providers.
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "POST".to_string(),
            timeout_secs: 3600,
        }
    }
}

/// Admission control configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Global admitted requests per second (leaky bucket, delays only).
    pub limit_per_second: u32,

    /// Per-client requests per window that trigger an informational alert.
    pub soft_cap_per_minute: u32,

    /// Per-client requests per window beyond which requests are rejected.
    pub hard_cap_per_minute: u32,

    /// Cap window length in seconds. The window rolls: every accepted
    /// request resets it to this full length.
    pub window_secs: u64,

    /// Identities rejected unconditionally.
    pub blocked_ips: Vec<String>,

    /// Identities exempt from per-client capping.
    pub always_allowed_ips: Vec<String>,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            limit_per_second: 100,
            soft_cap_per_minute: 100,
            hard_cap_per_minute: 1000,
            window_secs: 60,
            blocked_ips: Vec::new(),
            always_allowed_ips: vec!["127.0.0.1".to_string()],
        }
    }
}

/// Bearer-token authorization configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret clients must present base64 encoded. Unset disables
    /// authorization entirely.
    pub secret: Option<String>,
}

/// Webhook alert configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Incoming-webhook URL. Unset disables alert delivery.
    pub webhook_url: Option<String>,

    /// Channel the webhook posts to.
    pub channel: String,

    /// Username alerts are posted under.
    pub username: String,

    /// Emoji name for the alert avatar.
    pub icon_emoji: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            channel: String::new(),
            username: "proxy".to_string(),
            icon_emoji: "computer".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
