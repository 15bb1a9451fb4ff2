//! Response value object handed back to the protocol codec.
//!
//! # Design Decisions
//! - Body is plain bytes; streaming belongs to the codec
//! - Error responses optionally carry detail text, gated by the
//!   per-route `verbose_errors` override

use http::StatusCode;

use crate::http::params::HeaderValues;

/// A response produced by a handler or by the dispatcher itself.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderValues,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderValues::new(),
            body: Vec::new(),
        }
    }

    /// A response with a UTF-8 text body.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        let mut response = Self::new(status);
        response.body = body.into().into_bytes();
        response
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Dispatcher-generated error response.
    ///
    /// `detail` is included only when `verbose` is set; otherwise the body
    /// is the bare status reason.
    pub fn error(status: StatusCode, detail: &str, verbose: bool) -> Self {
        let body = if verbose {
            format!(
                "{} {}",
                status.canonical_reason().unwrap_or("error"),
                detail
            )
        } else {
            status.canonical_reason().unwrap_or("error").to_string()
        };
        Self::text(status, body)
    }
}
