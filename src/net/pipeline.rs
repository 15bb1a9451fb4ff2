//! Per-connection pipeline.
//!
//! # Data Flow
//! ```text
//! Admitted TCP connection
//!     → optional TLS termination (pluggable)
//!     → TCP_NODELAY (write buffering is managed here, not by the socket)
//!     → protocol codec (external) decodes RequestHead + body
//!     → RouteRegistry dispatch
//!     → handler invocation (per-route timeout / body-length / verbosity)
//!     → codec encodes the Response
//! ```
//!
//! # Design Decisions
//! - Each connection is owned by exactly one worker task; no
//!   per-connection state crosses threads
//! - The drain signal cancels the idle wait for the next request, never
//!   an in-flight handler invocation
//! - The per-route body limit is enforced after decode: the codec reads
//!   under the global default, the route's tighter limit answers 413

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::http::request::{Request, RequestHead};
use crate::http::response::Response;
use crate::net::admission::AdmittedConnection;
use crate::observability::metrics_names;
use crate::routing::registry::{Dispatch, RouteRegistry};

/// Byte stream flowing through the pipeline stages.
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

pub type BoxedStream = Box<dyn Stream>;

/// Pluggable TLS termination stage.
#[async_trait]
pub trait TlsTerminator: Send + Sync {
    async fn terminate(&self, stream: BoxedStream) -> io::Result<BoxedStream>;
}

/// External protocol codec: decodes request heads and bodies, encodes
/// responses. HTTP/1.1 or HTTP/2 framing is supplied by the embedding
/// application.
#[async_trait]
pub trait ProtocolCodec: Send + Sync {
    /// Decode the next request, reading at most `max_body_length` body
    /// bytes. `Ok(None)` signals a clean end of the connection.
    async fn read_request(
        &self,
        stream: &mut BoxedStream,
        max_body_length: usize,
    ) -> io::Result<Option<(RequestHead, Vec<u8>)>>;

    async fn write_response(
        &self,
        stream: &mut BoxedStream,
        response: &Response,
    ) -> io::Result<()>;
}

/// Pipeline-wide defaults, overridable per route binding.
#[derive(Debug, Clone)]
pub struct PipelineDefaults {
    pub request_timeout: Duration,
    pub max_body_length: usize,
    pub verbose_errors: bool,
}

impl Default for PipelineDefaults {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_length: 2 * 1024 * 1024,
            verbose_errors: false,
        }
    }
}

/// The per-connection serve loop shared by all workers.
pub struct ConnectionPipeline {
    registry: Arc<RouteRegistry>,
    codec: Arc<dyn ProtocolCodec>,
    tls: Option<Arc<dyn TlsTerminator>>,
    defaults: PipelineDefaults,
}

impl ConnectionPipeline {
    pub fn new(
        registry: Arc<RouteRegistry>,
        codec: Arc<dyn ProtocolCodec>,
        tls: Option<Arc<dyn TlsTerminator>>,
        defaults: PipelineDefaults,
    ) -> Self {
        Self {
            registry,
            codec,
            tls,
            defaults,
        }
    }

    /// Serve one connection until it closes, errors, or drain asks it to
    /// stop. Runs entirely on the worker task that owns the connection.
    pub async fn serve(&self, connection: AdmittedConnection, peer: SocketAddr) {
        let AdmittedConnection {
            stream,
            guard,
            mut closing,
        } = connection;
        let _guard = guard;

        if let Err(error) = stream.set_nodelay(true) {
            tracing::debug!(%peer, %error, "Failed to disable write buffering");
        }

        let mut stream: BoxedStream = Box::new(stream);
        if let Some(tls) = &self.tls {
            stream = match tls.terminate(stream).await {
                Ok(stream) => stream,
                Err(error) => {
                    tracing::debug!(%peer, %error, "TLS termination failed");
                    return;
                }
            };
        }

        loop {
            let decoded = tokio::select! {
                _ = closing.changed() => {
                    tracing::debug!(%peer, "Connection closing for drain");
                    break;
                }
                decoded = self.codec.read_request(&mut stream, self.defaults.max_body_length) => decoded,
            };

            let (head, body) = match decoded {
                Ok(Some(request)) => request,
                Ok(None) => break,
                Err(error) => {
                    tracing::debug!(%peer, %error, "Codec read failed");
                    break;
                }
            };

            let response = self.handle_request(head, body).await;
            if let Err(error) = self.codec.write_response(&mut stream, &response).await {
                tracing::debug!(%peer, %error, "Codec write failed");
                break;
            }
        }
    }

    async fn handle_request(&self, head: RequestHead, body: Vec<u8>) -> Response {
        let method = head.method.clone();
        let path = head.path.clone();

        let mut response = match self.registry.dispatch(&head) {
            Dispatch::Matched {
                binding,
                path_params,
            } => {
                metrics::counter!(metrics_names::REQUESTS_DISPATCHED).increment(1);
                let overrides = binding.overrides();
                let verbose = overrides
                    .verbose_errors
                    .unwrap_or(self.defaults.verbose_errors);

                let body_limit = overrides
                    .max_body_length
                    .unwrap_or(self.defaults.max_body_length);
                if body.len() > body_limit {
                    Response::error(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        &format!("body exceeds {body_limit} bytes"),
                        verbose,
                    )
                } else {
                    let mut request = Request::new(head);
                    request.path_params = path_params;
                    request.body = body;

                    let deadline = overrides
                        .request_timeout
                        .unwrap_or(self.defaults.request_timeout);
                    match tokio::time::timeout(deadline, binding.handler().handle(request)).await
                    {
                        Ok(mut response) => {
                            // Routes may declare a non-default success
                            // status; it applies when the handler left
                            // the status at its default.
                            if response.status == StatusCode::OK
                                && binding.route().status() != StatusCode::OK
                            {
                                response.status = binding.route().status();
                            }
                            response
                        }
                        Err(_) => {
                            tracing::warn!(
                                %method,
                                %path,
                                timeout = ?deadline,
                                "Handler exceeded request timeout"
                            );
                            Response::error(
                                StatusCode::SERVICE_UNAVAILABLE,
                                "handler timed out",
                                verbose,
                            )
                        }
                    }
                }
            }
            failure => {
                metrics::counter!(metrics_names::REQUESTS_UNMATCHED).increment(1);
                Response::error(
                    failure.failure_status(),
                    &format!("no route for {method} {path}"),
                    self.defaults.verbose_errors,
                )
            }
        };

        for (name, value) in self.registry.additional_headers() {
            response.headers.insert(name, value.clone());
        }
        response
    }
}
