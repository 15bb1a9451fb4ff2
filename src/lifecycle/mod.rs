//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (server.rs):
//!     Resolve ports → build pools → bind sequentially with retry
//!     → spawn accept loops → Running
//!
//! Shutdown (server.rs):
//!     Clear port table → stop accept loops → drain connections
//!     → worker pool (optional) → acceptor pools (async) → Stopped
//! ```
//!
//! # Design Decisions
//! - Ordered startup: ports bind one at a time, in configured order
//! - Ordered shutdown: stop accepting, drain, then stop pools
//! - Drain and pool termination are bounded; exceeding the bound is
//!   logged, never fatal

pub mod server;
pub mod state;

pub use server::{Server, StartupError};
pub use state::LifecycleState;
