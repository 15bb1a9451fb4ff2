//! HTTP value objects shared with external collaborators.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → codec (external) decodes into request.rs::RequestHead
//!     → routing layer selects a RouteBinding
//!     → handler.rs::Handler produces response.rs::Response
//!     → codec (external) encodes and writes
//! ```
//!
//! # Design Decisions
//! - Wire framing is out of scope; these types are the hand-off surface
//! - Multimaps (params.rs) back both query parameters and headers so the
//!   predicate engine evaluates them uniformly

pub mod handler;
pub mod media;
pub mod params;
pub mod request;
pub mod response;

pub use handler::{handler_fn, Handler};
pub use media::MediaType;
pub use params::{HeaderValues, ParamMap};
pub use request::{Request, RequestHead};
pub use response::Response;
