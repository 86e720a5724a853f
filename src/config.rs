//! Node connection configuration.
//!
//! Values come either from code or from the environment (the binary loads a
//! `.env` file first via `dotenv`).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const ENV_REST_HOST: &str = "LND_REST_HOST";
pub const ENV_MACAROON: &str = "LND_MACAROON";
pub const ENV_MACAROON_PATH: &str = "LND_MACAROON_PATH";
pub const ENV_TLS_CERT_PATH: &str = "LND_TLS_CERT_PATH";
pub const ENV_ACCEPT_INVALID_CERTS: &str = "LND_ACCEPT_INVALID_CERTS";
pub const ENV_REQUESTS_PER_SECOND: &str = "LND_REQUESTS_PER_SECOND";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("Failed to read {path}: {reason}")]
    Io { path: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct LndConfig {
    /// REST endpoint, e.g. `https://127.0.0.1:8080`; a missing scheme means https
    pub rest_host: String,
    /// Hex encoded macaroon sent with every request
    pub macaroon_hex: String,
    pub tls_cert_path: Option<PathBuf>,
    /// Nodes usually run with a self-signed certificate
    pub accept_invalid_certs: bool,
    pub requests_per_second: Option<u32>,
    pub request_timeout: Duration,
}

impl LndConfig {
    pub fn new(rest_host: impl Into<String>, macaroon_hex: impl Into<String>) -> Self {
        Self {
            rest_host: rest_host.into(),
            macaroon_hex: macaroon_hex.into(),
            tls_cert_path: None,
            accept_invalid_certs: false,
            requests_per_second: None,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes `std::env::var`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let rest_host = lookup(ENV_REST_HOST)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_REST_HOST))?;

        let macaroon_hex = match (lookup(ENV_MACAROON), lookup(ENV_MACAROON_PATH)) {
            (Some(hex_value), _) if !hex_value.trim().is_empty() => {
                let hex_value = hex_value.trim().to_string();
                hex::decode(&hex_value).map_err(|e| ConfigError::Invalid {
                    key: ENV_MACAROON,
                    reason: e.to_string(),
                })?;
                hex_value
            }
            (_, Some(path)) => {
                let bytes = std::fs::read(&path).map_err(|e| ConfigError::Io {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
                hex::encode(bytes)
            }
            _ => return Err(ConfigError::Missing(ENV_MACAROON)),
        };

        let accept_invalid_certs = match lookup(ENV_ACCEPT_INVALID_CERTS) {
            Some(v) => parse_bool(&v).ok_or_else(|| ConfigError::Invalid {
                key: ENV_ACCEPT_INVALID_CERTS,
                reason: format!("expected true/false, got '{}'", v),
            })?,
            None => false,
        };

        let requests_per_second = lookup(ENV_REQUESTS_PER_SECOND)
            .map(|v| {
                v.trim().parse::<u32>().map_err(|e| ConfigError::Invalid {
                    key: ENV_REQUESTS_PER_SECOND,
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            rest_host,
            macaroon_hex,
            tls_cert_path: lookup(ENV_TLS_CERT_PATH).map(PathBuf::from),
            accept_invalid_certs,
            requests_per_second,
            request_timeout: DEFAULT_TIMEOUT,
        })
    }

    /// REST base URL with scheme and without trailing slash
    pub fn rest_base_url(&self) -> String {
        let host = self.rest_host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        }
    }

    /// WebSocket base URL derived from the REST base URL
    pub fn ws_base_url(&self) -> String {
        let rest = self.rest_base_url();
        if let Some(rest_of) = rest.strip_prefix("https://") {
            format!("wss://{}", rest_of)
        } else if let Some(rest_of) = rest.strip_prefix("http://") {
            format!("ws://{}", rest_of)
        } else {
            rest
        }
    }

    /// PEM bytes of the pinned certificate, if one is configured
    pub fn tls_cert_pem(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        self.tls_cert_path
            .as_ref()
            .map(|path| {
                std::fs::read(path).map_err(|e| ConfigError::Io {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_minimal() {
        let config = LndConfig::from_lookup(lookup_from(&[
            (ENV_REST_HOST, "127.0.0.1:8080"),
            (ENV_MACAROON, "0201abcd"),
        ]))
        .unwrap();

        assert_eq!(config.rest_base_url(), "https://127.0.0.1:8080");
        assert_eq!(config.ws_base_url(), "wss://127.0.0.1:8080");
        assert_eq!(config.macaroon_hex, "0201abcd");
        assert!(!config.accept_invalid_certs);
        assert_eq!(config.requests_per_second, None);
    }

    #[test]
    fn test_missing_host() {
        let err = LndConfig::from_lookup(lookup_from(&[(ENV_MACAROON, "00")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_REST_HOST)));
    }

    #[test]
    fn test_invalid_macaroon_hex() {
        let err = LndConfig::from_lookup(lookup_from(&[
            (ENV_REST_HOST, "localhost:8080"),
            (ENV_MACAROON, "not-hex"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_MACAROON, .. }));
    }

    #[test]
    fn test_optional_fields() {
        let config = LndConfig::from_lookup(lookup_from(&[
            (ENV_REST_HOST, "http://node.local:8080/"),
            (ENV_MACAROON, "00"),
            (ENV_ACCEPT_INVALID_CERTS, "yes"),
            (ENV_REQUESTS_PER_SECOND, "15"),
        ]))
        .unwrap();

        assert_eq!(config.rest_base_url(), "http://node.local:8080");
        assert_eq!(config.ws_base_url(), "ws://node.local:8080");
        assert!(config.accept_invalid_certs);
        assert_eq!(config.requests_per_second, Some(15));
    }

    #[test]
    fn test_macaroon_path_missing_file() {
        let err = LndConfig::from_lookup(lookup_from(&[
            (ENV_REST_HOST, "localhost:8080"),
            (ENV_MACAROON_PATH, "/nonexistent/admin.macaroon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
