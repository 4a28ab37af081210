//! Structured logging.
//!
//! # Responsibilities
//! - Build the process subscriber (filter, formatter, optional span export)
//! - Forward access-log lines as structured events
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - The configured level filters the formatter only; span export has its own
//!   fixed `info` floor, so a quiet log level never disables tracing
//! - Write failures are dropped by the formatter and never reach the caller

use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};

/// Target of forwarded access-log events.
pub const ACCESS_LOG_TARGET: &str = "access_log";

/// Most verbose level handed to the span exporter.
const TELEMETRY_LEVEL: LevelFilter = LevelFilter::INFO;

/// Layer stacked directly on the registry (span export).
pub type RegistryLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Build the subscriber stack, writing formatted events to `writer`.
pub fn subscriber<W>(
    config: &LoggingConfig,
    writer: W,
    telemetry: Option<RegistryLayer>,
) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = env_filter(&config.level);
    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(telemetry.map(|layer| layer.with_filter(TELEMETRY_LEVEL)))
        .with(fmt_layer)
}

/// Install the process-wide subscriber writing to stdout.
pub fn init(config: &LoggingConfig, telemetry: Option<RegistryLayer>) -> Result<(), TryInitError> {
    subscriber(config, std::io::stdout, telemetry).try_init()
}

/// Forward one access-log line as an `info` event.
pub fn forward_access_line(line: &str) {
    tracing::info!(target: ACCESS_LOG_TARGET, "{}", line.trim());
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}


#[cfg(test)]
mod tests {
    use super::test_support::CapturedLogs;
    use super::*;

    fn config(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            format: LogFormat::Json,
        }
    }

    #[test]
    fn test_json_record_schema() {
        let logs = CapturedLogs::default();
        tracing::subscriber::with_default(subscriber(&config("info"), logs.clone(), None), || {
            tracing::info!(method = "GET", status = 200u16, "request_completed");
        });

        let records = logs.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record["level"], "INFO");
        assert_eq!(record["message"], "request_completed");
        assert_eq!(record["method"], "GET");
        assert_eq!(record["status"], 200);
        assert!(record["timestamp"].is_string());
    }

    #[test]
    fn test_level_filter_drops_lower_severity() {
        let logs = CapturedLogs::default();
        tracing::subscriber::with_default(subscriber(&config("warn"), logs.clone(), None), || {
            tracing::info!("dropped");
            tracing::warn!("kept_warn");
            tracing::error!("kept_error");
        });

        let messages: Vec<_> = logs
            .records()
            .iter()
            .map(|r| r["message"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(messages, vec!["kept_warn", "kept_error"]);
    }

    #[derive(Clone, Default)]
    struct SpanCounter(std::sync::Arc<std::sync::atomic::AtomicUsize>);

    impl<S: Subscriber> Layer<S> for SpanCounter {
        fn on_new_span(
            &self,
            _attrs: &tracing::span::Attributes<'_>,
            _id: &tracing::span::Id,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[test]
    fn test_log_level_does_not_filter_span_export() {
        let logs = CapturedLogs::default();
        let spans = SpanCounter::default();
        let telemetry: RegistryLayer = Box::new(spans.clone());

        tracing::subscriber::with_default(
            subscriber(&config("warn"), logs.clone(), Some(telemetry)),
            || {
                let span = tracing::info_span!("http_request");
                let _entered = span.enter();
                tracing::info!("hidden_from_logs");
                tracing::debug_span!("too_verbose").in_scope(|| {});
            },
        );

        assert_eq!(spans.0.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(logs.with_message("hidden_from_logs").is_empty());
    }

    #[test]
    fn test_access_line_is_trimmed() {
        let logs = CapturedLogs::default();
        tracing::subscriber::with_default(subscriber(&config("info"), logs.clone(), None), || {
            forward_access_line("127.0.0.1 - - \"GET / HTTP/1.1\" 200\n");
        });

        let records = logs.records();
        assert_eq!(records[0]["message"], "127.0.0.1 - - \"GET / HTTP/1.1\" 200");
        assert_eq!(records[0]["target"], ACCESS_LOG_TARGET);
        assert_eq!(records[0]["level"], "INFO");
    }
}
