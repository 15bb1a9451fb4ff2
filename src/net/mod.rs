//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (resolved ports, bind with retry)
//!     → admission.rs (admit or force-close, tracked for drain)
//!     → pipeline.rs (TLS stage, codec, dispatch, handler)
//!
//! Connection lifetime:
//!     Accepted → Admitted → Serving → Closed (guard releases the slot)
//! ```
//!
//! # Design Decisions
//! - Overflow connections are reset immediately, not queued
//! - Each admitted connection is tracked so shutdown can drain it
//! - TLS and wire framing are pluggable stages supplied by the host

pub mod admission;
pub mod listener;
pub mod pipeline;

pub use admission::{AdmissionController, AdmissionGuard, AdmittedConnection, ConnectionId};
pub use listener::{BindError, ListenerPort, ListenerPortError, Protocol};
pub use pipeline::{
    BoxedStream, ConnectionPipeline, PipelineDefaults, ProtocolCodec, TlsTerminator,
};
