//! Server lifecycle orchestration.
//!
//! # Responsibilities
//! - Resolve configured ports and bind them sequentially, with retry
//! - Own the acceptor and worker pools and the admission controller
//! - Run the graceful shutdown sequence: stop advertising, drain,
//!   worker pool, acceptor pools
//!
//! # Design Decisions
//! - `start`/`stop` are blocking and serialized by one lifecycle lock;
//!   the CAS `running` flag makes concurrent calls safe and `stop`
//!   idempotent
//! - Binds are chained strictly one after another for deterministic
//!   startup order and log output
//! - Acceptor pool termination is fire-and-forget: `stop` returns
//!   without waiting on it, errors are logged

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::runtime::{self, Runtime};
use tokio::sync::broadcast;

use crate::config::schema::ServerConfig;
use crate::lifecycle::state::{LifecycleState, StateCell};
use crate::net::admission::AdmissionController;
use crate::net::listener::{
    bind_with_retry, resolve_ports, BindError, ListenerPort, ListenerPortError, Protocol,
};
use crate::net::pipeline::{ConnectionPipeline, PipelineDefaults, ProtocolCodec, TlsTerminator};
use crate::routing::registry::RouteRegistry;

/// Fatal startup failure; the server transitions to `Failed`.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("server is already running")]
    AlreadyRunning,

    #[error("failed to resolve bind address {host}:{port}: {source}")]
    AddressResolution {
        host: String,
        port: u16,
        source: io::Error,
    },

    #[error(transparent)]
    Port(#[from] ListenerPortError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("failed to build {pool} pool: {source}")]
    PoolBuild {
        pool: &'static str,
        source: io::Error,
    },
}

/// Thread pools and the accept-loop stop signal, created by `start` and
/// torn down by `stop`. Guarded by the lifecycle lock.
struct Pools {
    acceptor: Option<Runtime>,
    worker: Option<Runtime>,
    shutdown_tx: Option<broadcast::Sender<()>>,
}

/// The embeddable listener/dispatcher server.
///
/// Owns the acceptor and worker pools, the admission controller and the
/// active port table. Routes, codec and TLS stage are supplied at
/// construction and immutable afterwards.
pub struct Server {
    config: ServerConfig,
    pipeline: Arc<ConnectionPipeline>,
    admission: Arc<AdmissionController>,
    state: StateCell,
    running: AtomicBool,
    active_ports: Mutex<HashMap<SocketAddr, ListenerPort>>,
    pools: Mutex<Pools>,
}

impl Server {
    /// Build a server from a validated configuration, a frozen route
    /// registry, the wire codec and an optional TLS stage.
    pub fn new(
        config: ServerConfig,
        registry: Arc<RouteRegistry>,
        codec: Arc<dyn ProtocolCodec>,
        tls: Option<Arc<dyn TlsTerminator>>,
    ) -> Self {
        let defaults = PipelineDefaults {
            request_timeout: Duration::from_secs(config.limits.request_timeout_secs),
            max_body_length: config.limits.max_body_length,
            verbose_errors: config.limits.verbose_errors,
        };
        let pipeline = Arc::new(ConnectionPipeline::new(registry, codec, tls, defaults));
        let admission = AdmissionController::new(config.max_connections);

        Self {
            config,
            pipeline,
            admission,
            state: StateCell::new(),
            running: AtomicBool::new(false),
            active_ports: Mutex::new(HashMap::new()),
            pools: Mutex::new(Pools {
                acceptor: None,
                worker: None,
                shutdown_tx: None,
            }),
        }
    }

    /// Bind all configured ports and begin accepting connections.
    ///
    /// Blocks until every port is bound (or startup has failed). Ports
    /// bind strictly in configured order; an "address in use" failure is
    /// retried on the next free port up to `server_restart_count` times.
    pub fn start(&self) -> Result<(), StartupError> {
        let mut pools = self.pools.lock().expect("lifecycle lock");

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(StartupError::AlreadyRunning);
        }
        self.state.set(LifecycleState::Starting);

        match self.start_inner(&mut pools) {
            Ok(()) => {
                self.state.set(LifecycleState::Running);
                tracing::info!(
                    ports = self.active_ports.lock().expect("port table").len(),
                    "Server running"
                );
                Ok(())
            }
            Err(error) => {
                tracing::error!(%error, "Startup failed");
                self.running.store(false, Ordering::SeqCst);
                self.state.set(LifecycleState::Failed);
                self.active_ports.lock().expect("port table").clear();
                teardown_pools(&mut pools);
                Err(error)
            }
        }
    }

    fn start_inner(&self, pools: &mut Pools) -> Result<(), StartupError> {
        let configured = self.configured_ports()?;
        let resolved = resolve_ports(configured, default_port());

        let acceptor = runtime::Builder::new_multi_thread()
            .worker_threads(self.config.accept_threads.max(1))
            .thread_name("portico-acceptor")
            .enable_all()
            .build()
            .map_err(|source| StartupError::PoolBuild {
                pool: "acceptor",
                source,
            })?;

        // A worker pool left alive by a previous stop is reused.
        let worker = match pools.worker.take() {
            Some(worker) => worker,
            None => {
                let io_threads = if self.config.io_threads == 0 {
                    2 * num_cpus::get()
                } else {
                    self.config.io_threads
                };
                runtime::Builder::new_multi_thread()
                    .worker_threads(io_threads)
                    .thread_name("portico-worker")
                    .enable_all()
                    .build()
                    .map_err(|source| StartupError::PoolBuild {
                        pool: "worker",
                        source,
                    })?
            }
        };

        let (shutdown_tx, _) = broadcast::channel(1);

        for port in &resolved {
            // Each bind completes before the next is attempted.
            let (listener, bound) =
                acceptor.block_on(bind_with_retry(port, self.config.server_restart_count))?;

            self.active_ports
                .lock()
                .expect("port table")
                .insert(bound.address(), bound.clone());

            acceptor.spawn(accept_loop(
                listener,
                bound,
                Arc::clone(&self.admission),
                Arc::clone(&self.pipeline),
                worker.handle().clone(),
                shutdown_tx.subscribe(),
            ));
        }

        pools.acceptor = Some(acceptor);
        pools.worker = Some(worker);
        pools.shutdown_tx = Some(shutdown_tx);
        Ok(())
    }

    /// Graceful shutdown: stop advertising, drain admitted connections,
    /// then stop the pools.
    ///
    /// `timeout` bounds the drain; `quiet_period` bounds pool
    /// termination. Calling `stop` on a server that is not running is a
    /// no-op. Does not wait for acceptor-pool termination.
    pub fn stop(&self, quiet_period: Duration, timeout: Duration) {
        let mut pools = self.pools.lock().expect("lifecycle lock");

        // Stop advertising before anything else.
        self.active_ports.lock().expect("port table").clear();

        if self
            .running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Stop requested but server is not running");
            return;
        }
        self.state.set(LifecycleState::Stopping);

        // Accept loops exit on the broadcast; their listeners close with
        // them.
        if let Some(shutdown_tx) = pools.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }

        // Drain: ask every admitted connection to close and wait for the
        // close callbacks.
        let drained = match pools.worker.as_ref() {
            Some(worker) => worker.block_on(self.admission.drain(timeout)),
            None => true,
        };
        if !drained {
            tracing::warn!(
                remaining = self.admission.active_count(),
                ?timeout,
                "Drain did not complete in time; proceeding with shutdown"
            );
        }

        if self.config.shutdown.shutdown_worker_pool_on_stop {
            if let Some(worker) = pools.worker.take() {
                worker.shutdown_timeout(quiet_period);
            }
        } else {
            tracing::debug!("Worker pool left running for reuse");
        }

        // Acceptor pools terminate asynchronously; stop does not block
        // on them.
        if let Some(acceptor) = pools.acceptor.take() {
            let grace = quiet_period;
            let spawned = std::thread::Builder::new()
                .name("portico-acceptor-shutdown".to_string())
                .spawn(move || {
                    acceptor.shutdown_timeout(grace);
                    tracing::debug!("Acceptor pool terminated");
                });
            if let Err(error) = spawned {
                tracing::warn!(%error, "Failed to detach acceptor pool shutdown");
            }
        }

        self.state.set(LifecycleState::Stopped);
        tracing::info!("Server stopped");
    }

    /// `stop` with the durations from the configuration.
    pub fn stop_default(&self) {
        self.stop(
            Duration::from_secs(self.config.shutdown.quiet_period_secs),
            Duration::from_secs(self.config.shutdown.timeout_secs),
        );
    }

    fn configured_ports(&self) -> Result<Vec<ListenerPort>, StartupError> {
        self.config
            .ports
            .iter()
            .map(|port| {
                let address = (port.host.as_str(), port.port)
                    .to_socket_addrs()
                    .map_err(|source| StartupError::AddressResolution {
                        host: port.host.clone(),
                        port: port.port,
                        source,
                    })?
                    .next()
                    .ok_or_else(|| StartupError::AddressResolution {
                        host: port.host.clone(),
                        port: port.port,
                        source: io::Error::new(io::ErrorKind::NotFound, "no addresses resolved"),
                    })?;
                Ok(ListenerPort::new(
                    address,
                    port.protocols.iter().copied(),
                )?)
            })
            .collect()
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of the currently bound ports.
    pub fn bound_ports(&self) -> Vec<ListenerPort> {
        self.active_ports
            .lock()
            .expect("port table")
            .values()
            .cloned()
            .collect()
    }

    /// The admission controller shared by this server's accept loops.
    pub fn admission(&self) -> &Arc<AdmissionController> {
        &self.admission
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("state", &self.state.get())
            .field("active", &self.admission.active_count())
            .finish()
    }
}

fn default_port() -> ListenerPort {
    ListenerPort::new(
        SocketAddr::from(([0, 0, 0, 0], 8080)),
        [Protocol::Http],
    )
    .expect("default port is valid")
}

fn teardown_pools(pools: &mut Pools) {
    pools.shutdown_tx = None;
    if let Some(acceptor) = pools.acceptor.take() {
        acceptor.shutdown_timeout(Duration::from_millis(100));
    }
    if let Some(worker) = pools.worker.take() {
        worker.shutdown_timeout(Duration::from_millis(100));
    }
}

/// One accept loop per bound listener, running on the acceptor pool.
async fn accept_loop(
    listener: TcpListener,
    bound: ListenerPort,
    admission: Arc<AdmissionController>,
    pipeline: Arc<ConnectionPipeline>,
    workers: runtime::Handle,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    tracing::debug!(listener = %bound, "Accept loop started");
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::debug!(listener = %bound, "Accept loop stopping");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if let Some(connection) = admission.admit(stream) {
                        let pipeline = Arc::clone(&pipeline);
                        workers.spawn(async move {
                            pipeline.serve(connection, peer).await;
                        });
                    }
                }
                Err(error) => {
                    tracing::warn!(listener = %bound, %error, "Accept failed");
                    // Back off briefly so fd exhaustion doesn't spin the
                    // acceptor.
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }
}
