//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors reported)
//!     → ServerConfig (validated, immutable)
//!     → consumed by lifecycle::Server at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; routes and ports cannot change
//!   after `start`
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    LimitsConfig, ObservabilityConfig, PortConfig, ServerConfig, ShutdownConfig,
};
pub use validation::{validate_config, ValidationError};
