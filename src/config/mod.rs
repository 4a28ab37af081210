//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: PORT, LOG_LEVEL, OTEL_*)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → sections handed to each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow running with no file at all
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env, load_config, resolve_config, ConfigError};
pub use schema::{
    LifecycleConfig, ListenerConfig, LogFormat, LoggingConfig, MetricsConfig, ServiceConfig,
    TracingConfig, UsersConfig,
};
pub use validation::ValidationError;
