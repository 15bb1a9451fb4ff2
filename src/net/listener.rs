//! Listener ports: validation, resolution and bind-with-retry.
//!
//! # Responsibilities
//! - Validate `ListenerPort` construction (port range, protocol set)
//! - Resolve the configured port list into a distinct bind list,
//!   merging same-address entries by protocol union
//! - Bind each resolved port, retrying "address in use" failures by
//!   probing forward for the next free local port
//!
//! # Design Decisions
//! - Entries with port 0 (ephemeral) are never merged; each produces its
//!   own listener
//! - The free-port probe binds a throwaway std listener; the real bind
//!   can still race and lose, which consumes another retry
//! - Retry preserves the original protocol set

use std::collections::HashSet;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;

/// Lowest non-ephemeral port accepted by [`ListenerPort::new`].
const MIN_PORT: u16 = 1100;

/// Protocols a listener port can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
    Proxy,
}

/// Invalid `ListenerPort` construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ListenerPortError {
    #[error("port {0} outside the allowed range (0 or {MIN_PORT}..=65535)")]
    PortOutOfRange(u16),

    #[error("protocol set must not be empty")]
    EmptyProtocols,

    #[error("protocol set must contain http or https")]
    MissingHttpProtocol,
}

/// A bind address plus the protocols it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerPort {
    address: SocketAddr,
    protocols: HashSet<Protocol>,
}

impl ListenerPort {
    /// Validate and construct.
    ///
    /// Port 0 requests an ephemeral port; otherwise the port must be in
    /// `[1100, 65535]`. The protocol set must be non-empty and contain
    /// Http or Https (Proxy alone cannot serve).
    pub fn new(
        address: SocketAddr,
        protocols: impl IntoIterator<Item = Protocol>,
    ) -> Result<Self, ListenerPortError> {
        let port = address.port();
        if port != 0 && port < MIN_PORT {
            return Err(ListenerPortError::PortOutOfRange(port));
        }

        let protocols: HashSet<Protocol> = protocols.into_iter().collect();
        if protocols.is_empty() {
            return Err(ListenerPortError::EmptyProtocols);
        }
        if !protocols.contains(&Protocol::Http) && !protocols.contains(&Protocol::Https) {
            return Err(ListenerPortError::MissingHttpProtocol);
        }

        Ok(Self { address, protocols })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn protocols(&self) -> &HashSet<Protocol> {
        &self.protocols
    }

    /// Same protocols at a different address (used by bind retry and
    /// ephemeral-port resolution).
    pub(crate) fn rebound(&self, address: SocketAddr) -> Self {
        Self {
            address,
            protocols: self.protocols.clone(),
        }
    }

    fn merge_protocols(&mut self, other: &ListenerPort) {
        self.protocols.extend(other.protocols.iter().copied());
    }
}

impl std::fmt::Display for ListenerPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut protocols: Vec<&str> = self
            .protocols
            .iter()
            .map(|p| match p {
                Protocol::Http => "http",
                Protocol::Https => "https",
                Protocol::Proxy => "proxy",
            })
            .collect();
        protocols.sort_unstable();
        write!(f, "{} [{}]", self.address, protocols.join(","))
    }
}

/// Resolve the configured ports into the distinct list that will be
/// bound, in first-seen order.
///
/// Ports sharing a bind address are merged by unioning their protocol
/// sets; ephemeral (port 0) entries are never merged with each other.
/// An empty configuration yields the single `default_port`.
pub fn resolve_ports(configured: Vec<ListenerPort>, default_port: ListenerPort) -> Vec<ListenerPort> {
    if configured.is_empty() {
        return vec![default_port];
    }

    let mut resolved: Vec<ListenerPort> = Vec::with_capacity(configured.len());
    for port in configured {
        if port.address().port() != 0 {
            if let Some(existing) = resolved
                .iter_mut()
                .find(|candidate| candidate.address() == port.address())
            {
                existing.merge_protocols(&port);
                continue;
            }
        }
        resolved.push(port);
    }
    resolved
}

/// Bind failure, after retries where applicable.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("failed to bind {address}: {source}")]
    Io {
        address: SocketAddr,
        source: std::io::Error,
    },

    #[error("no free port found scanning forward from {from}")]
    NoFreePort { from: u16 },

    #[error("bind retries exhausted for {address} after {attempts} attempts")]
    RetriesExhausted { address: SocketAddr, attempts: u32 },
}

/// Bind `port`, retrying "address in use" failures up to `restart_count`
/// times by probing forward for the next free local port.
///
/// Returns the bound listener together with the effective
/// [`ListenerPort`] (original protocols, actual local address).
pub async fn bind_with_retry(
    port: &ListenerPort,
    restart_count: u32,
) -> Result<(TcpListener, ListenerPort), BindError> {
    let mut target = port.address();

    for attempt in 0..=restart_count {
        match TcpListener::bind(target).await {
            Ok(listener) => {
                let local = listener.local_addr().map_err(|source| BindError::Io {
                    address: target,
                    source,
                })?;
                let bound = port.rebound(local);
                tracing::info!(listener = %bound, "Listener bound");
                return Ok((listener, bound));
            }
            Err(error) if error.kind() == std::io::ErrorKind::AddrInUse => {
                if attempt == restart_count {
                    break;
                }
                let next = next_free_port(target)?;
                tracing::warn!(
                    address = %target,
                    retry_port = next,
                    attempt = attempt + 1,
                    "Address in use; retrying on next free port"
                );
                target.set_port(next);
            }
            Err(source) => {
                return Err(BindError::Io {
                    address: target,
                    source,
                })
            }
        }
    }

    Err(BindError::RetriesExhausted {
        address: port.address(),
        attempts: restart_count,
    })
}

/// Scan forward from the failed port for the next port a throwaway probe
/// socket can bind.
fn next_free_port(failed: SocketAddr) -> Result<u16, BindError> {
    let start = failed.port();
    let mut probe = failed;
    for candidate in start.saturating_add(1)..=u16::MAX {
        probe.set_port(candidate);
        if std::net::TcpListener::bind(probe).is_ok() {
            return Ok(candidate);
        }
    }
    Err(BindError::NoFreePort { from: start })
}
