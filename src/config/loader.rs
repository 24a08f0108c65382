//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::ValidationError;

/// Error type for configuration loading and resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from a TOML file.
///
/// Only syntax is checked here; semantic validation runs once flag and
/// environment overrides have been layered on top.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ProxyConfig = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn minimal_file_fills_defaults() {
        let path = write_temp(
            "proxy_config_minimal.toml",
            r#"
[upstream]
url = "https://rpc.example.com/v1/key"
"#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.upstream.url, "https://rpc.example.com/v1/key");
        assert_eq!(config.upstream.method, "POST");
        assert_eq!(config.listener.bind_address, "0.0.0.0:8000");
        assert_eq!(config.admission.limit_per_second, 100);
        assert_eq!(config.admission.hard_cap_per_minute, 1000);
        assert_eq!(config.admission.always_allowed_ips, vec!["127.0.0.1"]);
        assert!(config.auth.secret.is_none());

        fs::remove_file(path).unwrap_or_default();
    }

    #[test]
    fn sections_override_defaults() {
        let path = write_temp(
            "proxy_config_full.toml",
            r##"
[listener]
bind_address = "127.0.0.1:9001"

[upstream]
url = "https://rpc.example.com"
method = "get"
timeout_secs = 30

[admission]
limit_per_second = 5
soft_cap_per_minute = 10
hard_cap_per_minute = 20
blocked_ips = ["203.0.113.50"]

[notifier]
webhook_url = "https://hooks.example.com/services/T/B/x"
channel = "#rpc-alerts"
"##,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9001");
        assert_eq!(config.upstream.method, "get");
        assert_eq!(config.upstream.timeout_secs, 30);
        assert_eq!(config.admission.blocked_ips, vec!["203.0.113.50"]);
        assert_eq!(config.notifier.channel, "#rpc-alerts");
        assert_eq!(config.notifier.username, "proxy");

        fs::remove_file(path).unwrap_or_default();
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let path = write_temp("proxy_config_broken.toml", "upstream = {");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        fs::remove_file(path).unwrap_or_default();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_config(Path::new("/nonexistent/proxy.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
