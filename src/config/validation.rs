//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and that
//! addresses and paths are usable. Returns all errors, not just the first.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ShopConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is not a valid socket address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must not be empty")]
    EmptyPath(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("unknown log level {0:?}")]
    UnknownLogLevel(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ShopConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let server = &config.server;

    check_address(&mut errors, "server.bind_address", &server.bind_address);
    for (field, path) in [
        ("server.cert_path", &server.cert_path),
        ("server.key_path", &server.key_path),
        ("server.client_ca_path", &server.client_ca_path),
    ] {
        if path.trim().is_empty() {
            errors.push(ValidationError::EmptyPath(field));
        }
    }
    if server.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("server.max_body_bytes"));
    }
    for (field, secs) in [
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.max_connection_age_secs", config.timeouts.max_connection_age_secs),
        ("timeouts.tls_handshake_secs", config.timeouts.tls_handshake_secs),
    ] {
        if secs == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::UnknownLogLevel(observability.log_level.clone()));
    }
    if observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ShopConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ShopConfig::default();
        config.server.key_path = "  ".into();
        config.server.client_ca_path = String::new();
        config.observability.log_level = "verbose".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyPath("server.key_path"),
                ValidationError::EmptyPath("server.client_ca_path"),
                ValidationError::UnknownLogLevel("verbose".into()),
            ]
        );
    }

    #[test]
    fn test_metrics_address_only_checked_when_enabled() {
        let mut config = ShopConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            errors[0],
            ValidationError::InvalidAddress { field: "observability.metrics_address", .. }
        ));
    }

    #[test]
    fn test_zero_connection_lifetimes_rejected() {
        let mut config = ShopConfig::default();
        assert_eq!(config.timeouts.max_connection_age_secs, 60);
        config.timeouts.max_connection_age_secs = 0;
        config.timeouts.tls_handshake_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::Zero("timeouts.max_connection_age_secs"),
                ValidationError::Zero("timeouts.tls_handshake_secs"),
            ]
        );
    }
}
