//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, pool sizes, limits)
//! - Validate protocol sets before ports are constructed
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before the config is accepted into the server

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::net::listener::Protocol;

/// One semantic problem found in a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ports[{index}]: port {port} outside the allowed range (0 or 1100..=65535)")]
    PortOutOfRange { index: usize, port: u16 },

    #[error("ports[{index}]: protocol set must not be empty")]
    EmptyProtocols { index: usize },

    #[error("ports[{index}]: protocol set must contain http or https")]
    MissingHttpProtocol { index: usize },

    #[error("accept_threads must be at least 1")]
    NoAcceptThreads,

    #[error("max_connections must be at least 1")]
    NoConnectionsAllowed,

    #[error("limits.max_body_length must be at least 1 byte")]
    ZeroBodyLimit,

    #[error("shutdown.timeout_secs must be at least shutdown.quiet_period_secs")]
    TimeoutShorterThanQuietPeriod,
}

/// Check everything, collecting every violation.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (index, port) in config.ports.iter().enumerate() {
        if port.port != 0 && port.port < 1100 {
            errors.push(ValidationError::PortOutOfRange {
                index,
                port: port.port,
            });
        }
        if port.protocols.is_empty() {
            errors.push(ValidationError::EmptyProtocols { index });
        } else if !port
            .protocols
            .iter()
            .any(|p| matches!(p, Protocol::Http | Protocol::Https))
        {
            errors.push(ValidationError::MissingHttpProtocol { index });
        }
    }

    if config.accept_threads == 0 {
        errors.push(ValidationError::NoAcceptThreads);
    }
    if config.max_connections == 0 {
        errors.push(ValidationError::NoConnectionsAllowed);
    }
    if config.limits.max_body_length == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.shutdown.timeout_secs < config.shutdown.quiet_period_secs {
        errors.push(ValidationError::TimeoutShorterThanQuietPeriod);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PortConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = ServerConfig::default();
        config.accept_threads = 0;
        config.max_connections = 0;
        config.ports.push(PortConfig {
            host: "127.0.0.1".into(),
            port: 80,
            protocols: Vec::new(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::NoAcceptThreads));
        assert!(errors.contains(&ValidationError::PortOutOfRange { index: 0, port: 80 }));
    }

    #[test]
    fn proxy_only_port_is_rejected() {
        let mut config = ServerConfig::default();
        config.ports.push(PortConfig {
            host: "127.0.0.1".into(),
            port: 8080,
            protocols: vec![Protocol::Proxy],
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::MissingHttpProtocol { index: 0 }]
        );
    }
}
