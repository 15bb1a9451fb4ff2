//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! listener. All types derive Serde traits for deserialization from
//! config files, and every field has a default so minimal configs work.

use serde::{Deserialize, Serialize};

use crate::net::listener::Protocol;

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Ports to bind. Empty means one default port.
    pub ports: Vec<PortConfig>,

    /// Acceptor pool size.
    pub accept_threads: usize,

    /// I/O worker pool size; 0 means 2 × available cores.
    pub io_threads: usize,

    /// Maximum concurrently admitted connections.
    pub max_connections: usize,

    /// Retries allowed when a configured port is already in use.
    pub server_restart_count: u32,

    /// Graceful shutdown tuning.
    pub shutdown: ShutdownConfig,

    /// Request handling defaults, overridable per route.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// One configured listener port.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PortConfig {
    /// Bind host; a name is resolved at startup.
    pub host: String,

    /// Port number; 0 asks the OS for an ephemeral port.
    pub port: u16,

    /// Protocols served on this port.
    pub protocols: Vec<Protocol>,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            protocols: vec![Protocol::Http],
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ports: Vec::new(),
            accept_threads: 1,
            io_threads: 0,
            // Effectively unbounded unless configured.
            max_connections: usize::MAX,
            server_restart_count: 3,
            shutdown: ShutdownConfig::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Quiet period granted to pools before forced termination.
    pub quiet_period_secs: u64,

    /// Upper bound on the drain step.
    pub timeout_secs: u64,

    /// Whether `stop` shuts the worker pool down or leaves it for reuse.
    pub shutdown_worker_pool_on_stop: bool,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            quiet_period_secs: 2,
            timeout_secs: 15,
            shutdown_worker_pool_on_stop: true,
        }
    }
}

/// Request handling defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_length: usize,

    /// Whether dispatcher error responses carry detail text.
    pub verbose_errors: bool,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_body_length: 2 * 1024 * 1024, // 2MB
            verbose_errors: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
