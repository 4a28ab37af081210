//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request pipeline and handlers produce:
//!     → logging.rs (structured log events, access-log lines)
//!     → metrics.rs (request counters, process gauges)
//!     → tracing.rs (spans exported to an OTLP collector)
//!
//! Consumers:
//!     → stdout (JSON lines)
//!     → GET /metrics (Prometheus scrape)
//!     → OTLP/HTTP collector (e.g., Jaeger)
//! ```
//!
//! # Design Decisions
//! - Each piece is constructed by the entry point and passed down explicitly
//! - Observability failures are logged, never surfaced to request handling
//! - Tracing is optional; the service runs unobserved if the exporter fails to start

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use self::metrics::{Exposition, MetricsError, MetricsRegistry, HTTP_REQUESTS_TOTAL};
pub use self::tracing::{TelemetryError, TraceProvider};
