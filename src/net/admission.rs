//! Connection admission control.
//!
//! # Responsibilities
//! - Bound concurrently accepted connections per listener group
//! - Track admitted connections for graceful drain
//! - Force-close overflow connections without a shutdown handshake
//! - Coalesce overload logging into one summary line per window
//!
//! # Design Decisions
//! - Count-and-reject, not queue-and-wait: an overflow connection is
//!   closed immediately with linger 0 so half-closed sockets cannot pile up
//! - Drop reporting is armed once per quiet window by a CAS flag; the
//!   one-shot flush reads-and-resets the window counter
//! - Counters are lock-free atomics; the tracked set is the only shared
//!   structure and lives in a concurrent map

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::observability::metrics_names;

/// Delay between the first drop in a window and its summary log line.
const DROP_FLUSH_DELAY: Duration = Duration::from_secs(1);

/// Interval at which [`AdmissionController::drain`] re-checks the
/// tracked set.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an admitted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

struct TrackedConnection {
    close_tx: watch::Sender<bool>,
}

/// Admission gate shared by all accept loops of a server instance.
pub struct AdmissionController {
    max_connections: usize,
    /// Currently admitted connections.
    current: AtomicUsize,
    /// Drops since the last flush (the coalescing window).
    dropped_window: AtomicUsize,
    accepted_total: AtomicU64,
    dropped_total: AtomicU64,
    flush_scheduled: AtomicBool,
    connections: DashMap<ConnectionId, TrackedConnection>,
}

impl AdmissionController {
    pub fn new(max_connections: usize) -> Arc<Self> {
        Arc::new(Self {
            max_connections,
            current: AtomicUsize::new(0),
            dropped_window: AtomicUsize::new(0),
            accepted_total: AtomicU64::new(0),
            dropped_total: AtomicU64::new(0),
            flush_scheduled: AtomicBool::new(false),
            connections: DashMap::new(),
        })
    }

    /// Admit or reject a freshly accepted connection.
    ///
    /// On rejection the stream's linger is set to zero and the stream is
    /// closed here; `None` is returned and the drop is counted.
    pub fn admit(self: &Arc<Self>, stream: TcpStream) -> Option<AdmittedConnection> {
        if self.current.fetch_add(1, Ordering::SeqCst) + 1 > self.max_connections {
            self.current.fetch_sub(1, Ordering::SeqCst);
            self.force_close(stream);
            self.record_drop();
            return None;
        }

        let id = ConnectionId::next();
        let (close_tx, close_rx) = watch::channel(false);
        self.connections.insert(id, TrackedConnection { close_tx });
        self.accepted_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(metrics_names::CONNECTIONS_ACCEPTED).increment(1);

        Some(AdmittedConnection {
            stream,
            closing: close_rx,
            guard: AdmissionGuard {
                controller: Arc::clone(self),
                id,
            },
        })
    }

    fn force_close(&self, stream: TcpStream) {
        // Linger 0 turns the close into a reset; an error here only
        // costs us the reset, not the close.
        if let Err(error) = stream.set_linger(Some(Duration::ZERO)) {
            tracing::debug!(%error, "Failed to set linger on rejected connection");
        }
        drop(stream);
    }

    fn record_drop(self: &Arc<Self>) {
        self.dropped_window.fetch_add(1, Ordering::SeqCst);
        self.dropped_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(metrics_names::CONNECTIONS_DROPPED).increment(1);

        // First drop in a quiet window arms the one-shot flush.
        if self
            .flush_scheduled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let controller = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(DROP_FLUSH_DELAY).await;
                controller.flush_dropped();
            });
        }
    }

    fn flush_dropped(&self) {
        self.flush_scheduled.store(false, Ordering::SeqCst);
        let dropped = self.dropped_window.swap(0, Ordering::SeqCst);
        if dropped > 0 {
            tracing::warn!(
                dropped,
                max_connections = self.max_connections,
                "Connections rejected by admission control"
            );
        }
    }

    fn release(&self, id: ConnectionId) {
        self.connections.remove(&id);
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    /// Currently admitted connection count.
    pub fn active_count(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// Drops recorded in the current coalescing window.
    pub fn dropped_in_window(&self) -> usize {
        self.dropped_window.load(Ordering::SeqCst)
    }

    pub fn accepted_total(&self) -> u64 {
        self.accepted_total.load(Ordering::Relaxed)
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Ask every tracked connection to close.
    pub fn signal_close_all(&self) {
        for entry in self.connections.iter() {
            let _ = entry.value().close_tx.send(true);
        }
    }

    /// Drain step of shutdown: signal all connections, then wait for
    /// their close callbacks until `timeout`.
    ///
    /// Returns `true` if every connection released before the deadline.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.signal_close_all();

        let deadline = tokio::time::Instant::now() + timeout;
        while self.active_count() > 0 {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
        true
    }
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("max_connections", &self.max_connections)
            .field("active", &self.active_count())
            .finish()
    }
}

/// An admitted connection: the stream, its registry guard, and the
/// close signal the pipeline must honor during drain.
#[derive(Debug)]
pub struct AdmittedConnection {
    pub stream: TcpStream,
    pub guard: AdmissionGuard,
    pub closing: watch::Receiver<bool>,
}

/// Removes the connection from the tracked set and decrements the
/// admitted count when dropped, from whichever worker owns the
/// connection.
pub struct AdmissionGuard {
    controller: Arc<AdmissionController>,
    id: ConnectionId,
}

impl AdmissionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.controller.release(self.id);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

impl std::fmt::Debug for AdmissionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGuard").field("id", &self.id).finish()
    }
}
