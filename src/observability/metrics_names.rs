//! Metric names recorded through the `metrics` facade.
//!
//! # Metrics
//! - `portico_connections_accepted_total` (counter): admitted connections
//! - `portico_connections_dropped_total` (counter): admission rejections
//! - `portico_requests_dispatched_total` (counter): requests routed to a
//!   handler
//! - `portico_requests_unmatched_total` (counter): requests answered with
//!   a dispatch failure status

pub const CONNECTIONS_ACCEPTED: &str = "portico_connections_accepted_total";
pub const CONNECTIONS_DROPPED: &str = "portico_connections_dropped_total";
pub const REQUESTS_DISPATCHED: &str = "portico_requests_dispatched_total";
pub const REQUESTS_UNMATCHED: &str = "portico_requests_unmatched_total";
