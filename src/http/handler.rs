//! Handler invocation seam.

use async_trait::async_trait;

use crate::http::request::Request;
use crate::http::response::Response;

/// A request handler bound to a route.
///
/// Handlers are supplied by the embedding application at configuration
/// time and shared read-only across worker tasks.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: Request) -> Response;
}

/// Adapter for using an async closure as a [`Handler`].
pub struct HandlerFn<F>(F);

/// Wrap an async function or closure as a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Response> + Send + 'static,
{
    HandlerFn(f)
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Response> + Send + 'static,
{
    async fn handle(&self, request: Request) -> Response {
        (self.0)(request).await
    }
}
