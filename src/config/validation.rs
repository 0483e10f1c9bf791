//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and addresses.
//! Returns all validation errors, not just the first.

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("upstream.address `{0}` is not a host[:port] authority")]
    UpstreamAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("health.path `{0}` must start with '/'")]
    HealthPath(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),

    #[error("listener.tls.{0} must not be empty")]
    TlsPath(&'static str),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero("listener.max_connections"));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() {
            errors.push(ValidationError::TlsPath("cert_path"));
        }
        if tls.key_path.trim().is_empty() {
            errors.push(ValidationError::TlsPath("key_path"));
        }
    }

    match config.upstream.authority() {
        Ok(authority) if !authority.host().is_empty() => {}
        _ => errors.push(ValidationError::UpstreamAddress(config.upstream.address.clone())),
    }

    if config.pool.max_connections == 0 {
        errors.push(ValidationError::Zero("pool.max_connections"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.connect_secs"));
    }
    if config.health.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("health.max_body_bytes"));
    }
    if !config.health.path.starts_with('/') {
        errors.push(ValidationError::HealthPath(config.health.path.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
