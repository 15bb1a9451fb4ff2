//! Structured logging initialization.
//!
//! # Responsibilities
//! - Initialize a tracing subscriber for hosts that don't bring their own
//! - Honor `RUST_LOG` over the configured level
//!
//! # Design Decisions
//! - Embedding hosts that already installed a subscriber simply skip this;
//!   a second initialization is reported, not fatal

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a formatting subscriber with an env-filter.
///
/// `default_level` is used when `RUST_LOG` is unset, e.g. `"portico=info"`.
/// Returns `false` if a global subscriber was already installed.
pub fn init(default_level: &str) -> bool {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_level.into());

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok();

    if !installed {
        tracing::debug!("Global tracing subscriber already installed; skipping init");
    }
    installed
}
