//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics_names.rs (counter names updated via the metrics facade)
//!
//! Consumers:
//!     → Log aggregation (stdout, file, remote)
//!     → Whatever metrics recorder the embedding host installs
//! ```
//!
//! # Design Decisions
//! - Structured logging via tracing; the host picks the subscriber
//! - Metric updates are cheap (atomic increments behind the facade);
//!   recorder installation is the host's concern, not this crate's

pub mod logging;
pub mod metrics_names;
