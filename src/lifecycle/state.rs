//! Lifecycle state tracking.

use std::sync::atomic::{AtomicU8, Ordering};

/// Where the server is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Created = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
    Stopped = 4,
    /// Startup failed (bind retries exhausted or pools unavailable).
    Failed = 5,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleState::Created => "created",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Lock-free cell holding the current [`LifecycleState`].
///
/// Transitions are already serialized by the lifecycle lock; the cell
/// only makes reads safe from any thread.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(LifecycleState::Created as u8))
    }

    pub fn get(&self) -> LifecycleState {
        match self.0.load(Ordering::SeqCst) {
            0 => LifecycleState::Created,
            1 => LifecycleState::Starting,
            2 => LifecycleState::Running,
            3 => LifecycleState::Stopping,
            4 => LifecycleState::Stopped,
            _ => LifecycleState::Failed,
        }
    }

    pub fn set(&self, state: LifecycleState) {
        self.0.store(state as u8, Ordering::SeqCst);
        tracing::debug!(%state, "Lifecycle state changed");
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
