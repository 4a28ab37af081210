//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Declare counter and gauge families with fixed label names
//! - Count requests per (method, route, status)
//! - Render a Prometheus text snapshot on demand
//! - Report process gauges (memory, start time, uptime)
//!
//! # Metrics
//! - `http_requests_total` (counter): total requests by method, route, status
//! - `process_start_time_seconds` (gauge)
//! - `process_uptime_seconds` (gauge)
//! - `process_resident_memory_bytes` (gauge, Linux only)
//! - `process_virtual_memory_bytes` (gauge, Linux only)
//!
//! # Design Decisions
//! - The Prometheus recorder is owned by the registry, never installed as
//!   the global `metrics` recorder
//! - Series handles are atomics; increments never take a registry-wide lock
//! - Process gauges are refreshed lazily, at collection time

use std::fmt;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use metrics::{Key, KeyName, Label, Level, Metadata, Recorder, SharedString};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use thiserror::Error;

/// Request counter exposed by the request pipeline.
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

/// `Content-Type` of the exposition served on `/metrics`.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const PROCESS_START_TIME: &str = "process_start_time_seconds";
const PROCESS_UPTIME: &str = "process_uptime_seconds";
const PROCESS_RESIDENT_MEMORY: &str = "process_resident_memory_bytes";
const PROCESS_VIRTUAL_MEMORY: &str = "process_virtual_memory_bytes";

/// Errors returned by [`MetricsRegistry`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetricsError {
    /// A family with this name was declared before.
    #[error("metric '{0}' is already registered")]
    AlreadyRegistered(String),

    /// No family with this name was declared.
    #[error("metric '{0}' is not registered")]
    UnknownMetric(String),

    /// Number of label values differs from the declared label names.
    #[error("metric '{name}' expects {expected} label values, got {actual}")]
    LabelMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Operation does not apply to this family's type.
    #[error("metric '{name}' is a {actual}, not a {expected}")]
    KindMismatch {
        name: String,
        expected: MetricKind,
        actual: MetricKind,
    },
}

/// Type of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Counter => write!(f, "counter"),
            MetricKind::Gauge => write!(f, "gauge"),
        }
    }
}

struct Family {
    kind: MetricKind,
    label_names: Vec<String>,
}

/// Process-wide registry of counters and gauges.
///
/// Constructed once by the entry point and shared behind an `Arc`.
pub struct MetricsRegistry {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    families: DashMap<String, Family>,
    process: Option<ProcessMetrics>,
}

impl MetricsRegistry {
    /// Create a registry, optionally with the process gauges declared.
    pub fn new(process_metrics: bool) -> Result<Self, MetricsError> {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        let mut registry = Self {
            recorder,
            handle,
            families: DashMap::new(),
            process: None,
        };

        if process_metrics {
            registry.process = Some(ProcessMetrics::register(&registry)?);
        }

        Ok(registry)
    }

    /// Declare a counter family.
    pub fn register_counter(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<(), MetricsError> {
        self.declare(name, help, label_names, MetricKind::Counter)
    }

    /// Declare a gauge family.
    pub fn register_gauge(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<(), MetricsError> {
        self.declare(name, help, label_names, MetricKind::Gauge)
    }

    /// Add one to the counter series identified by `label_values`.
    ///
    /// The series is created on first use.
    pub fn increment(&self, name: &str, label_values: &[&str]) -> Result<(), MetricsError> {
        let key = self.series_key(name, label_values, MetricKind::Counter)?;
        self.recorder.register_counter(&key, &metadata()).increment(1);
        Ok(())
    }

    /// Set the gauge series identified by `label_values`.
    pub fn set_gauge(
        &self,
        name: &str,
        label_values: &[&str],
        value: f64,
    ) -> Result<(), MetricsError> {
        let key = self.series_key(name, label_values, MetricKind::Gauge)?;
        self.recorder.register_gauge(&key, &metadata()).set(value);
        Ok(())
    }

    /// Snapshot every family in the Prometheus text format.
    pub fn collect(&self) -> Exposition {
        if let Some(process) = &self.process {
            process.refresh(self);
        }
        Exposition(self.handle.render())
    }

    /// Current value of one series, if it has been recorded.
    pub fn series_value(&self, name: &str, label_values: &[&str]) -> Option<f64> {
        let expected: Vec<(String, String)> = {
            let family = self.families.get(name)?;
            family
                .label_names
                .iter()
                .cloned()
                .zip(label_values.iter().map(|v| v.to_string()))
                .collect()
        };

        let exposition = Exposition(self.handle.render());
        let found = exposition
            .samples()
            .find(|sample| sample.name == name && sample.labels == expected)
            .map(|sample| sample.value);
        found
    }

    fn declare(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
        kind: MetricKind,
    ) -> Result<(), MetricsError> {
        match self.families.entry(name.to_string()) {
            Entry::Occupied(_) => Err(MetricsError::AlreadyRegistered(name.to_string())),
            Entry::Vacant(slot) => {
                let key_name = KeyName::from(name.to_string());
                let description = SharedString::from(help.to_string());
                match kind {
                    MetricKind::Counter => {
                        self.recorder.describe_counter(key_name, None, description)
                    }
                    MetricKind::Gauge => self.recorder.describe_gauge(key_name, None, description),
                }

                slot.insert(Family {
                    kind,
                    label_names: label_names.iter().map(|l| l.to_string()).collect(),
                });
                Ok(())
            }
        }
    }

    fn series_key(
        &self,
        name: &str,
        label_values: &[&str],
        kind: MetricKind,
    ) -> Result<Key, MetricsError> {
        let family = self
            .families
            .get(name)
            .ok_or_else(|| MetricsError::UnknownMetric(name.to_string()))?;

        if family.kind != kind {
            return Err(MetricsError::KindMismatch {
                name: name.to_string(),
                expected: kind,
                actual: family.kind,
            });
        }

        if family.label_names.len() != label_values.len() {
            return Err(MetricsError::LabelMismatch {
                name: name.to_string(),
                expected: family.label_names.len(),
                actual: label_values.len(),
            });
        }

        let labels: Vec<Label> = family
            .label_names
            .iter()
            .zip(label_values)
            .map(|(label, value)| Label::new(label.clone(), value.to_string()))
            .collect();

        Ok(Key::from_parts(name.to_string(), labels))
    }
}

fn metadata() -> Metadata<'static> {
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()))
}

/// Rendered metrics snapshot.
#[derive(Debug, Clone)]
pub struct Exposition(String);

/// One value line of an [`Exposition`].
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

impl Exposition {
    /// Lines of the exposition, lazily split.
    pub fn lines(&self) -> std::str::Lines<'_> {
        self.0.lines()
    }

    /// Value lines parsed into samples. Comment and blank lines are skipped.
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.lines().filter_map(parse_sample)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Exposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn parse_sample(line: &str) -> Option<Sample> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (series, value) = line.rsplit_once(' ')?;
    let value = value.parse::<f64>().ok()?;

    let (name, labels) = match series.split_once('{') {
        Some((name, rest)) => {
            let body = rest.strip_suffix('}')?;
            let labels = body
                .split("\",")
                .filter(|pair| !pair.is_empty())
                .filter_map(|pair| {
                    let (key, value) = pair.split_once("=\"")?;
                    Some((
                        key.to_string(),
                        value.trim_end_matches('"').to_string(),
                    ))
                })
                .collect();
            (name, labels)
        }
        None => (series, Vec::new()),
    };

    Some(Sample {
        name: name.to_string(),
        labels,
        value,
    })
}

/// Process gauges refreshed at collection time.
struct ProcessMetrics {
    started: Instant,
    start_time_secs: f64,
}

impl ProcessMetrics {
    fn register(registry: &MetricsRegistry) -> Result<Self, MetricsError> {
        registry.register_gauge(
            PROCESS_START_TIME,
            "Start time of the process since unix epoch in seconds.",
            &[],
        )?;
        registry.register_gauge(PROCESS_UPTIME, "Process uptime in seconds.", &[])?;
        registry.register_gauge(
            PROCESS_RESIDENT_MEMORY,
            "Resident memory size in bytes.",
            &[],
        )?;
        registry.register_gauge(
            PROCESS_VIRTUAL_MEMORY,
            "Virtual memory size in bytes.",
            &[],
        )?;

        let start_time_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();

        Ok(Self {
            started: Instant::now(),
            start_time_secs,
        })
    }

    fn refresh(&self, registry: &MetricsRegistry) {
        let mut readings = vec![
            (PROCESS_START_TIME, self.start_time_secs),
            (PROCESS_UPTIME, self.started.elapsed().as_secs_f64()),
        ];

        if let Some(memory) = MemoryUsage::read() {
            readings.push((PROCESS_RESIDENT_MEMORY, memory.resident_bytes as f64));
            readings.push((PROCESS_VIRTUAL_MEMORY, memory.virtual_bytes as f64));
        }

        for (name, value) in readings {
            if let Err(e) = registry.set_gauge(name, &[], value) {
                tracing::debug!(metric = name, error = %e, "Failed to refresh process metric");
            }
        }
    }
}

struct MemoryUsage {
    resident_bytes: u64,
    virtual_bytes: u64,
}

impl MemoryUsage {
    /// Read `VmRSS`/`VmSize` from procfs; `None` where procfs is unavailable.
    fn read() -> Option<Self> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        Self::parse(&status)
    }

    fn parse(status: &str) -> Option<Self> {
        let field = |prefix: &str| {
            status
                .lines()
                .find_map(|line| line.strip_prefix(prefix))
                .and_then(|rest| rest.trim().trim_end_matches("kB").trim().parse::<u64>().ok())
                .map(|kb| kb * 1024)
        };

        Some(Self {
            resident_bytes: field("VmRSS:")?,
            virtual_bytes: field("VmSize:")?,
        })
    }
}
