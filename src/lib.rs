//! Embeddable HTTP listener/dispatcher.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌─────────────────────────────────────────────────┐
//!                    │                     SERVER                      │
//!                    │                                                 │
//!   TCP connection   │  ┌──────────┐   ┌───────────┐   ┌──────────┐   │
//!   ─────────────────┼─▶│   net    │──▶│    net    │──▶│ routing  │   │
//!                    │  │ listener │   │ admission │   │ registry │   │
//!                    │  └──────────┘   └───────────┘   └────┬─────┘   │
//!                    │                                      │         │
//!                    │                                      ▼         │
//!                    │  ┌──────────┐   ┌───────────┐   ┌──────────┐   │
//!   Response         │  │  codec   │◀──│ pipeline  │◀──│ handler  │   │
//!   ◀────────────────┼──│(external)│   │           │   │ (bound)  │   │
//!                    │  └──────────┘   └───────────┘   └──────────┘   │
//!                    │                                                 │
//!                    │  ┌───────────────────────────────────────────┐ │
//!                    │  │          Cross-Cutting Concerns           │ │
//!                    │  │ ┌────────┐ ┌───────────┐ ┌─────────────┐  │ │
//!                    │  │ │ config │ │ lifecycle │ │observability│  │ │
//!                    │  │ └────────┘ └───────────┘ └─────────────┘  │ │
//!                    │  └───────────────────────────────────────────┘ │
//!                    └─────────────────────────────────────────────────┘
//! ```
//!
//! The server binds configured ports (sequentially, with address-in-use
//! retry), admits connections under a configurable cap, and dispatches
//! decoded requests against an immutable table of declarative routes.
//! Wire framing, TLS termination and handler logic are supplied by the
//! embedding application through the [`net::pipeline`] seams.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ServerConfig;
pub use lifecycle::{LifecycleState, Server, StartupError};
pub use net::{ListenerPort, Protocol};
pub use routing::{RouteBinding, RouteRegistry, RouteSpec};
