//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::str::FromStr;

use axum::http::uri::{Authority, InvalidUri};
use serde::{Deserialize, Serialize};

/// Root configuration for the reverse proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// The single backend every request is forwarded to.
    pub upstream: UpstreamConfig,

    /// Connection reuse limits towards the backend.
    pub pool: PoolConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Health response normalization.
    pub health: HealthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8089").
    pub bind_address: String,

    /// Optional TLS configuration. When set the listener terminates HTTPS.
    pub tls: Option<TlsConfig>,

    /// Maximum requests processed concurrently (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8089".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Backend authority (e.g., "localhost:4199").
    pub address: String,
}

impl UpstreamConfig {
    /// Parse the configured address as a URI authority.
    pub fn authority(&self) -> Result<Authority, InvalidUri> {
        Authority::from_str(&self.address)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "localhost:4199".to_string(),
        }
    }
}

/// Connection pool limits for the backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle connections kept open to the backend.
    pub max_idle_per_host: usize,

    /// Maximum concurrent connections to the backend.
    pub max_connections: usize,

    /// Idle connections are closed after this many seconds.
    pub idle_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 10,
            max_connections: 50,
            idle_timeout_secs: 90,
        }
    }
}

/// Timeout configuration for backend connections.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// TCP keep-alive interval in seconds.
    pub keepalive_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            keepalive_secs: 30,
        }
    }
}

/// Health response normalization settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Request path whose response body is rewritten.
    pub path: String,

    /// Largest health body that is buffered for rewriting.
    pub max_body_bytes: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            path: "/health".to_string(),
            max_body_bytes: 1024 * 1024, // 1MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = ProxyConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8089");
        assert_eq!(config.upstream.address, "localhost:4199");
        assert_eq!(config.pool.max_idle_per_host, 10);
        assert_eq!(config.pool.max_connections, 50);
        assert_eq!(config.pool.idle_timeout_secs, 90);
        assert_eq!(config.timeouts.connect_secs, 5);
        assert_eq!(config.timeouts.keepalive_secs, 30);
        assert_eq!(config.health.path, "/health");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [upstream]
            address = "backend.internal:8080"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.address, "backend.internal:8080");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.pool.max_connections, 50);
    }

    #[test]
    fn upstream_authority_parses() {
        let upstream = UpstreamConfig::default();
        let authority = upstream.authority().unwrap();
        assert_eq!(authority.host(), "localhost");
        assert_eq!(authority.port_u16(), Some(4199));
    }
}
