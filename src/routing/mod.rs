//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming RequestHead (method, path, query, headers)
//!     → registry.rs (scan bindings in frozen order)
//!     → spec.rs (path, method, media, predicate stages)
//!     → predicate.rs (guard evaluation)
//!     → Return: matched RouteBinding or typed failure (404/405/415/406)
//!
//! Route Compilation (at configuration time):
//!     RouteSpec::builder() ... build()
//!     → RouteRegistry::builder().register(..)
//!     → freeze(): sort by ascending complexity, registration order ties
//!     → Immutable registry shared via Arc
//! ```
//!
//! # Design Decisions
//! - Routes compiled before `start`, immutable at runtime
//! - Deterministic: same input always selects the same route
//! - First full match wins; near-misses classified for status mapping

pub mod predicate;
pub mod registry;
pub mod spec;

pub use predicate::{Predicate, PredicateParseError};
pub use registry::{Dispatch, RouteBinding, RouteOverrides, RouteRegistry, RouteRegistryBuilder};
pub use spec::{PathType, RouteBuildError, RouteSpec, RouteSpecBuilder};
