//! Route table and request dispatch.
//!
//! # Responsibilities
//! - Hold the ordered table of (RouteSpec, handler, overrides) bindings
//! - Select the first fully matching binding for a request head
//! - Classify near-misses so the pipeline can answer 405/415/406
//!
//! # Design Decisions
//! - Immutable after `freeze()`; shared via Arc, no locks at match time
//! - Candidates are scanned by ascending complexity, then registration
//!   order; first full match wins
//! - Response headers registered on the builder are an instance field,
//!   never a process-wide map

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;

use crate::http::handler::Handler;
use crate::http::params::ParamMap;
use crate::http::request::RequestHead;
use crate::routing::spec::{RouteSpec, SpecMatch};

/// Per-route overrides applied by the pipeline around handler invocation.
#[derive(Debug, Clone, Default)]
pub struct RouteOverrides {
    pub request_timeout: Option<Duration>,
    pub max_body_length: Option<usize>,
    pub verbose_errors: Option<bool>,
}

/// One registered route: spec, handler, overrides.
pub struct RouteBinding {
    route: RouteSpec,
    handler: Arc<dyn Handler>,
    overrides: RouteOverrides,
}

impl RouteBinding {
    pub fn new(route: RouteSpec, handler: Arc<dyn Handler>) -> Self {
        Self {
            route,
            handler,
            overrides: RouteOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: RouteOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn route(&self) -> &RouteSpec {
        &self.route
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn overrides(&self) -> &RouteOverrides {
        &self.overrides
    }
}

impl std::fmt::Debug for RouteBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteBinding")
            .field("route", &self.route)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

/// Outcome of a dispatch attempt.
#[derive(Debug)]
pub enum Dispatch {
    Matched {
        binding: Arc<RouteBinding>,
        path_params: ParamMap,
    },
    /// No route matched the path at all.
    NotFound,
    /// A route matched the path but not the method.
    MethodNotAllowed,
    /// Path and method matched; Content-Type did not.
    UnsupportedMediaType,
    /// Path, method and Content-Type matched; Accept did not.
    NotAcceptable,
}

impl Dispatch {
    /// Status for a failed dispatch; panics on `Matched`.
    pub fn failure_status(&self) -> StatusCode {
        match self {
            Dispatch::Matched { .. } => unreachable!("matched dispatch has no failure status"),
            Dispatch::NotFound => StatusCode::NOT_FOUND,
            Dispatch::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Dispatch::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Dispatch::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
        }
    }
}

/// Accumulates bindings at configuration time; `freeze()` produces the
/// immutable registry.
#[derive(Default)]
pub struct RouteRegistryBuilder {
    bindings: Vec<RouteBinding>,
    additional_headers: Vec<(String, String)>,
}

impl RouteRegistryBuilder {
    pub fn register(mut self, binding: RouteBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn register_all(mut self, bindings: impl IntoIterator<Item = RouteBinding>) -> Self {
        self.bindings.extend(bindings);
        self
    }

    /// Header appended to every response produced through this registry.
    pub fn additional_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_headers.push((name.into(), value.into()));
        self
    }

    /// Sort by ascending complexity (stable, so registration order breaks
    /// ties) and freeze.
    pub fn freeze(self) -> RouteRegistry {
        let mut bindings: Vec<Arc<RouteBinding>> =
            self.bindings.into_iter().map(Arc::new).collect();
        bindings.sort_by_key(|b| b.route.complexity());

        tracing::debug!(routes = bindings.len(), "Route registry frozen");

        RouteRegistry {
            bindings,
            additional_headers: self.additional_headers,
        }
    }
}

/// The immutable, ordered route table.
pub struct RouteRegistry {
    bindings: Vec<Arc<RouteBinding>>,
    additional_headers: Vec<(String, String)>,
}

impl RouteRegistry {
    pub fn builder() -> RouteRegistryBuilder {
        RouteRegistryBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Headers the pipeline appends to every response.
    pub fn additional_headers(&self) -> &[(String, String)] {
        &self.additional_headers
    }

    /// Select a binding for the request head.
    ///
    /// Candidates are scanned in frozen order; the first full match wins.
    /// On failure, the furthest stage any candidate reached decides the
    /// classification: method mismatch → 405, consumes → 415, produces →
    /// 406, otherwise (including predicate mismatches) → 404.
    pub fn dispatch(&self, head: &RequestHead) -> Dispatch {
        // 0 = nothing matched the path, 1 = method failed, 2 = consumes
        // failed, 3 = produces failed.
        let mut furthest = 0u8;

        for binding in &self.bindings {
            match binding.route.evaluate(head) {
                SpecMatch::Matched(path_params) => {
                    tracing::debug!(
                        method = %head.method,
                        path = %head.path,
                        pattern = binding.route.path_pattern(),
                        "Route matched"
                    );
                    return Dispatch::Matched {
                        binding: Arc::clone(binding),
                        path_params,
                    };
                }
                SpecMatch::Method => furthest = furthest.max(1),
                SpecMatch::Consumes => furthest = furthest.max(2),
                SpecMatch::Produces => furthest = furthest.max(3),
                SpecMatch::Path | SpecMatch::Predicate => {}
            }
        }

        let outcome = match furthest {
            1 => Dispatch::MethodNotAllowed,
            2 => Dispatch::UnsupportedMediaType,
            3 => Dispatch::NotAcceptable,
            _ => Dispatch::NotFound,
        };
        tracing::debug!(
            method = %head.method,
            path = %head.path,
            outcome = ?outcome,
            "No route matched"
        );
        outcome
    }
}

impl std::fmt::Debug for RouteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteRegistry")
            .field("routes", &self.bindings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    use crate::http::handler::handler_fn;
    use crate::http::media::MediaType;
    use crate::http::request::RequestHead;
    use crate::http::response::Response;
    use crate::routing::spec::PathType;

    fn noop_handler() -> Arc<dyn Handler> {
        Arc::new(handler_fn(|_| async { Response::new(StatusCode::OK) }))
    }

    fn binding(route: RouteSpec) -> RouteBinding {
        RouteBinding::new(route, noop_handler())
    }

    #[test]
    fn first_full_match_wins_by_complexity_then_registration() {
        // Registered more-complex first; the simpler route must still be
        // tried first after the freeze sort.
        let complex = RouteSpec::builder()
            .path("/api")
            .path_type(PathType::Prefix)
            .matches_params(["debug"])
            .build()
            .unwrap();
        let simple = RouteSpec::builder()
            .path("/api")
            .path_type(PathType::Prefix)
            .build()
            .unwrap();

        let registry = RouteRegistry::builder()
            .register(binding(complex))
            .register(binding(simple))
            .freeze();

        let head = RequestHead::new(Method::GET, "/api/users");
        match registry.dispatch(&head) {
            Dispatch::Matched { binding, .. } => {
                assert_eq!(binding.route().complexity(), 2);
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn registration_order_breaks_complexity_ties() {
        let first = RouteSpec::builder()
            .path("/dup")
            .status(StatusCode::OK)
            .build()
            .unwrap();
        let second = RouteSpec::builder()
            .path("/dup")
            .status(StatusCode::ACCEPTED)
            .build()
            .unwrap();

        let registry = RouteRegistry::builder()
            .register(binding(first))
            .register(binding(second))
            .freeze();

        match registry.dispatch(&RequestHead::new(Method::GET, "/dup")) {
            Dispatch::Matched { binding, .. } => {
                assert_eq!(binding.route().status(), StatusCode::OK);
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn method_mismatch_classified_as_405() {
        let registry = RouteRegistry::builder()
            .register(binding(
                RouteSpec::builder()
                    .path("/submit")
                    .methods([Method::POST])
                    .build()
                    .unwrap(),
            ))
            .freeze();

        let outcome = registry.dispatch(&RequestHead::new(Method::GET, "/submit"));
        assert!(matches!(outcome, Dispatch::MethodNotAllowed));
        assert_eq!(outcome.failure_status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn consumes_mismatch_classified_as_415() {
        let registry = RouteRegistry::builder()
            .register(binding(
                RouteSpec::builder()
                    .path("/submit")
                    .methods([Method::POST])
                    .consumes([MediaType::new("application", "json")])
                    .build()
                    .unwrap(),
            ))
            .freeze();

        let mut head = RequestHead::new(Method::POST, "/submit");
        head.headers.insert("Content-Type", "text/plain");
        assert!(matches!(
            registry.dispatch(&head),
            Dispatch::UnsupportedMediaType
        ));
    }

    #[test]
    fn produces_mismatch_classified_as_406() {
        let registry = RouteRegistry::builder()
            .register(binding(
                RouteSpec::builder()
                    .path("/feed")
                    .methods([Method::GET])
                    .produces([MediaType::new("application", "json")])
                    .build()
                    .unwrap(),
            ))
            .freeze();

        let mut head = RequestHead::new(Method::GET, "/feed");
        head.headers.insert("Accept", "text/html");
        assert!(matches!(registry.dispatch(&head), Dispatch::NotAcceptable));
    }

    #[test]
    fn unmatched_path_is_404() {
        let registry = RouteRegistry::builder()
            .register(binding(RouteSpec::builder().path("/a").build().unwrap()))
            .freeze();
        assert!(matches!(
            registry.dispatch(&RequestHead::new(Method::GET, "/b")),
            Dispatch::NotFound
        ));
    }

    #[test]
    fn predicate_mismatch_is_404() {
        let registry = RouteRegistry::builder()
            .register(binding(
                RouteSpec::builder()
                    .path("/search")
                    .matches_params(["q"])
                    .build()
                    .unwrap(),
            ))
            .freeze();
        assert!(matches!(
            registry.dispatch(&RequestHead::new(Method::GET, "/search")),
            Dispatch::NotFound
        ));
    }

    #[test]
    fn additional_headers_are_instance_scoped() {
        let a = RouteRegistry::builder()
            .additional_header("server", "portico")
            .freeze();
        let b = RouteRegistry::builder().freeze();

        assert_eq!(a.additional_headers().len(), 1);
        assert!(b.additional_headers().is_empty());
    }
}
