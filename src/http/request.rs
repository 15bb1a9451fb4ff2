//! Request head extracted by the external protocol codec.
//!
//! # Responsibilities
//! - Carry routing-relevant request information (method, path, query, headers)
//! - Derive negotiation inputs (Content-Type, Accept) on demand
//!
//! # Design Decisions
//! - Framing and body parsing live in the embedding application's codec;
//!   this type is the hand-off surface between codec and dispatcher
//! - Accept parsing tolerates malformed entries by skipping them

use http::Method;

use crate::http::media::MediaType;
use crate::http::params::{HeaderValues, ParamMap};

/// The decoded head of an incoming request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    /// Request path, without the query string.
    pub path: String,
    pub query: ParamMap,
    pub headers: HeaderValues,
}

impl RequestHead {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: ParamMap::new(),
            headers: HeaderValues::new(),
        }
    }

    /// The request's Content-Type, if present and well-formed.
    pub fn content_type(&self) -> Option<MediaType> {
        self.headers.get("content-type").and_then(MediaType::parse)
    }

    /// Media types the client accepts, in header order.
    ///
    /// A missing Accept header yields an empty list, which negotiation
    /// treats as "accepts anything".
    pub fn accepted_media(&self) -> Vec<MediaType> {
        self.headers
            .get_all("accept")
            .iter()
            .flat_map(|value| value.split(','))
            .filter_map(MediaType::parse)
            .collect()
    }
}

/// A request as seen by a handler: decoded head, path captures, raw body.
#[derive(Debug, Clone)]
pub struct Request {
    pub head: RequestHead,
    /// Captures from a parameterized path pattern, e.g. `{id}`.
    pub path_params: ParamMap,
    /// Opaque body bytes as produced by the codec.
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(head: RequestHead) -> Self {
        Self {
            head,
            path_params: ParamMap::new(),
            body: Vec::new(),
        }
    }
}
