//! Metrics declarations for the Sense BLE command engine.
//!
//! Every metric the engine records is declared here as a structured [`Metric`]
//! constant, so names are never typed twice and exporters can be given
//! descriptions up front. The `metrics` crate is re-exported for convenience.
//!
//! # Example
//!
//! ```rust,ignore
//! use sense_metrics::{describe_metrics, metric_defs, ExchangeLabels};
//!
//! // Initialize metric descriptions at startup
//! describe_metrics();
//!
//! let labels = ExchangeLabels::new("C4:7D:11:02:9A:10", "get_wifi_endpoint");
//! metrics::counter!(metric_defs::EXCHANGE_STARTED.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// How a metric is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Only ever increases.
    Counter,
    /// Set to a current value.
    Gauge,
    /// Records a distribution of samples.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static declaration of one engine metric.
///
/// ```rust
/// use sense_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const WRITES: Metric = Metric::counter("sense.example.writes")
///     .with_description("Example writes")
///     .with_unit(Unit::Count)
///     .with_labels(&["peripheral"]);
///
/// assert_eq!(WRITES.name, "sense.example.writes");
/// assert_eq!(WRITES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "sense.exchange.started").
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description.
    pub description: &'static str,
    /// The unit of measurement, if any.
    pub unit: Option<Unit>,
    /// Expected label keys.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Declare a counter.
    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    /// Declare a gauge.
    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    /// Declare a histogram.
    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    /// Attach a description.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Attach a unit.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Declare the label keys recorded with this metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => describe_counter!(self.name, unit, self.description),
            (MetricKind::Counter, None) => describe_counter!(self.name, self.description),
            (MetricKind::Gauge, Some(unit)) => describe_gauge!(self.name, unit, self.description),
            (MetricKind::Gauge, None) => describe_gauge!(self.name, self.description),
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description)
            }
            (MetricKind::Histogram, None) => describe_histogram!(self.name, self.description),
        }
    }
}

/// All metric definitions for the command engine.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Label Keys
    // ========================================================================

    /// Labels present on every exchange metric.
    pub const EXCHANGE_LABELS: &[&str] = &["peripheral", "command"];

    /// Exchange labels plus the resolution outcome.
    pub const OUTCOME_LABELS: &[&str] = &["peripheral", "command", "outcome"];

    // ========================================================================
    // Exchange Metrics
    // ========================================================================

    /// Exchanges started (the command was accepted for transmission).
    pub const EXCHANGE_STARTED: Metric = Metric::counter("sense.exchange.started")
        .with_description("Command exchanges started")
        .with_unit(Unit::Count)
        .with_labels(EXCHANGE_LABELS);

    /// Commands rejected because another exchange was pending.
    pub const EXCHANGE_BUSY: Metric = Metric::counter("sense.exchange.busy")
        .with_description("Commands rejected while another exchange was pending")
        .with_unit(Unit::Count)
        .with_labels(EXCHANGE_LABELS);

    /// Exchanges whose deadline fired before a resolving response.
    pub const EXCHANGE_TIMED_OUT: Metric = Metric::counter("sense.exchange.timed_out")
        .with_description("Command exchanges that hit their deadline")
        .with_unit(Unit::Count)
        .with_labels(EXCHANGE_LABELS);

    /// Exchanges resolved, by outcome (`ok` or an error kind).
    pub const EXCHANGE_RESOLVED: Metric = Metric::counter("sense.exchange.resolved")
        .with_description("Command exchanges resolved, by outcome")
        .with_unit(Unit::Count)
        .with_labels(OUTCOME_LABELS);

    /// Wall time from accepting a command to its resolution.
    pub const EXCHANGE_DURATION: Metric = Metric::histogram("sense.exchange.duration")
        .with_description("Time from accepting a command to its resolution")
        .with_unit(Unit::Seconds)
        .with_labels(OUTCOME_LABELS);

    // ========================================================================
    // Link Metrics
    // ========================================================================

    /// Fragments written to the command characteristic.
    pub const FRAGMENTS_WRITTEN: Metric = Metric::counter("sense.fragments.written")
        .with_description("Fragments written to the command characteristic")
        .with_unit(Unit::Count)
        .with_labels(&["peripheral"]);

    /// Fragments received on the response characteristic.
    pub const FRAGMENTS_RECEIVED: Metric = Metric::counter("sense.fragments.received")
        .with_description("Fragments received on the response characteristic")
        .with_unit(Unit::Count)
        .with_labels(&["peripheral"]);

    /// All metric definitions.
    pub const ALL: &[&Metric] = &[
        &EXCHANGE_STARTED,
        &EXCHANGE_BUSY,
        &EXCHANGE_TIMED_OUT,
        &EXCHANGE_RESOLVED,
        &EXCHANGE_DURATION,
        &FRAGMENTS_WRITTEN,
        &FRAGMENTS_RECEIVED,
    ];
}

/// Labels identifying one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeLabels {
    /// Peripheral address.
    pub peripheral: String,
    /// Command name.
    pub command: &'static str,
}

impl ExchangeLabels {
    /// Creates labels for a command sent to a peripheral.
    pub fn new(peripheral: impl Into<String>, command: &'static str) -> Self {
        Self {
            peripheral: peripheral.into(),
            command,
        }
    }

    /// Labels in the form the `metrics` macros take.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![
            ("peripheral", self.peripheral.clone()),
            ("command", self.command.to_string()),
        ]
    }

    /// Returns the labels with an `outcome` label appended.
    pub fn with_outcome(&self, outcome: &str) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.push(("outcome", outcome.to_string()));
        labels
    }
}

/// Describes all engine metrics.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::EXCHANGE_STARTED.name, "sense.exchange.started");
        assert_eq!(metric_defs::EXCHANGE_STARTED.kind, MetricKind::Counter);
        assert_eq!(metric_defs::EXCHANGE_DURATION.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::EXCHANGE_DURATION.unit, Some(Unit::Seconds));
        assert_eq!(metric_defs::FRAGMENTS_RECEIVED.labels, &["peripheral"]);
    }

    #[test]
    fn test_all_metrics_count() {
        assert_eq!(metric_defs::ALL.len(), 7);
    }

    #[test]
    fn test_labels_match_declarations() {
        let labels = ExchangeLabels::new("AA:BB", "pair_pill");
        let keys: Vec<_> = labels.to_labels().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, metric_defs::EXCHANGE_LABELS);

        let keys: Vec<_> = labels.with_outcome("ok").into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, metric_defs::OUTCOME_LABELS);
    }

    #[test]
    fn test_metric_minimal() {
        const MINIMAL: Metric = Metric::gauge("minimal");
        assert_eq!(MINIMAL.kind, MetricKind::Gauge);
        assert_eq!(MINIMAL.description, "");
        assert_eq!(MINIMAL.unit, None);
        assert_eq!(MINIMAL.labels, &[] as &[&str]);
    }
}
