//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Tracing → Logging → Metrics → Users → (caller binds listener)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Drain connections → Flush spans (bounded) → Exit code
//! ```
//!
//! # Design Decisions
//! - Tracing failures at startup degrade to running unobserved
//! - Exit waits for the span flush, up to a deadline
//! - Exit code 1 when the flush fails or times out

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{flush_telemetry, Shutdown};
pub use startup::{bootstrap, build_services, split_trace_start, Services, StartupError};
