//! Metrics infrastructure for the floodgrid clustering engine.
//!
//! This crate declares every metric emitted by floodgrid as a structured [`Metric`]
//! constant and re-exports the `metrics` facade. Without an installed recorder all
//! metric calls are no-ops, so library code can emit unconditionally.
//!
//! # Example
//!
//! ```rust,ignore
//! use floodgrid_metrics::{describe_metrics, metric_defs, ScopeLabels};
//!
//! // Initialize metrics descriptions at startup
//! describe_metrics();
//!
//! let labels = ScopeLabels::new("flat").with_zoom_level(3);
//! metrics::counter!(metric_defs::CLUSTERS_GENERATED.name, &labels.to_labels()).increment(12);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
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

/// A metric declaration with its metadata.
///
/// ```rust
/// use floodgrid_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const POINTS: Metric = Metric::counter("floodgrid.example.points")
///     .with_description("Points seen")
///     .with_unit(Unit::Count)
///     .with_labels(&["zoom_level"]);
///
/// assert_eq!(POINTS.name, "floodgrid.example.points");
/// assert_eq!(POINTS.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "floodgrid.points.aggregated").
    pub name: &'static str,
    /// The kind of metric (counter, gauge, histogram).
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn with_kind(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Counter)
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Gauge)
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Histogram)
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the metrics recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for floodgrid.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Raw points accepted by the point store.
    pub const POINTS_INGESTED: Metric = Metric::counter("floodgrid.points.ingested")
        .with_description("Raw points accepted by the point store")
        .with_unit(Unit::Count);

    /// Raw points rejected at ingestion because they failed validation.
    pub const POINTS_REJECTED: Metric = Metric::counter("floodgrid.points.rejected")
        .with_description("Raw points rejected at ingestion")
        .with_unit(Unit::Count)
        .with_labels(&["reason"]);

    // ========================================================================
    // Aggregation
    // ========================================================================

    /// Points folded into a cluster accumulator.
    ///
    /// Labels: zoom_level
    pub const POINTS_AGGREGATED: Metric = Metric::counter("floodgrid.points.aggregated")
        .with_description("Points folded into cluster accumulators")
        .with_unit(Unit::Count)
        .with_labels(&["zoom_level"]);

    /// Points excluded from aggregation.
    ///
    /// Labels: reason
    pub const POINTS_EXCLUDED: Metric = Metric::counter("floodgrid.points.excluded")
        .with_description("Points excluded from aggregation")
        .with_unit(Unit::Count)
        .with_labels(&["reason"]);

    /// Clusters produced by a generation run.
    ///
    /// Labels: mode, zoom_level
    pub const CLUSTERS_GENERATED: Metric = Metric::counter("floodgrid.clusters.generated")
        .with_description("Clusters produced by generation runs")
        .with_unit(Unit::Count)
        .with_labels(&["mode", "zoom_level"]);

    // ========================================================================
    // Generation lifecycle
    // ========================================================================

    /// Date generations committed to the cluster store.
    pub const GENERATION_COMMITTED: Metric = Metric::counter("floodgrid.generation.committed")
        .with_description("Date generations committed to the cluster store")
        .with_unit(Unit::Count)
        .with_labels(&["mode"]);

    /// Date generations that failed before commit.
    pub const GENERATION_FAILED: Metric = Metric::counter("floodgrid.generation.failed")
        .with_description("Date generations that failed before commit")
        .with_unit(Unit::Count)
        .with_labels(&["mode"]);

    /// Wall-clock time to build and commit one date generation.
    pub const GENERATION_DURATION: Metric = Metric::histogram("floodgrid.generation.duration_ms")
        .with_description("Wall-clock time to build and commit one date generation")
        .with_unit(Unit::Milliseconds)
        .with_labels(&["mode"]);

    /// Number of dates with a visible generation.
    pub const GENERATION_DATES: Metric = Metric::gauge("floodgrid.generation.dates")
        .with_description("Number of dates with a visible generation")
        .with_unit(Unit::Count);

    // ========================================================================
    // Queries
    // ========================================================================

    /// Clusters returned per query.
    ///
    /// Labels: kind (viewport, sub_clusters)
    pub const QUERY_RESULTS: Metric = Metric::histogram("floodgrid.query.results")
        .with_description("Clusters returned per query")
        .with_unit(Unit::Count)
        .with_labels(&["kind"]);

    /// Returns a slice of all defined metrics.
    pub const ALL: &[&Metric] = &[
        &POINTS_INGESTED,
        &POINTS_REJECTED,
        &POINTS_AGGREGATED,
        &POINTS_EXCLUDED,
        &CLUSTERS_GENERATED,
        &GENERATION_COMMITTED,
        &GENERATION_FAILED,
        &GENERATION_DURATION,
        &GENERATION_DATES,
        &QUERY_RESULTS,
    ];
}

/// Labels identifying the generation scope a metric was recorded in.
///
/// ```rust
/// use floodgrid_metrics::ScopeLabels;
///
/// let labels = ScopeLabels::new("hierarchical").with_zoom_level(4);
/// let label_vec = labels.to_labels();
///
/// assert!(label_vec.contains(&("mode", "hierarchical".to_string())));
/// assert!(label_vec.contains(&("zoom_level", "4".to_string())));
/// ```
#[derive(Debug, Clone)]
pub struct ScopeLabels {
    /// Generation mode (flat, hierarchical).
    pub mode: String,
    /// Zoom level, when the metric is level-scoped.
    pub zoom_level: Option<u8>,
}

impl ScopeLabels {
    /// Creates labels for the given generation mode.
    pub fn new(mode: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            zoom_level: None,
        }
    }

    /// Scopes the labels to a zoom level.
    pub fn with_zoom_level(mut self, zoom_level: u8) -> Self {
        self.zoom_level = Some(zoom_level);
        self
    }

    /// Converts the labels to the metrics crate label format.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        let mut labels = vec![("mode", self.mode.clone())];
        if let Some(zoom) = self.zoom_level {
            labels.push(("zoom_level", zoom.to_string()));
        }
        labels
    }
}

/// Describes all floodgrid metrics.
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
    fn test_scope_labels_without_zoom() {
        let labels = ScopeLabels::new("flat");
        let label_vec = labels.to_labels();

        assert_eq!(label_vec.len(), 1);
        assert!(label_vec.contains(&("mode", "flat".to_string())));
    }

    #[test]
    fn test_scope_labels_with_zoom() {
        let label_vec = ScopeLabels::new("flat").with_zoom_level(12).to_labels();

        assert_eq!(label_vec.len(), 2);
        assert!(label_vec.contains(&("zoom_level", "12".to_string())));
    }

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::POINTS_AGGREGATED.name, "floodgrid.points.aggregated");
        assert_eq!(metric_defs::POINTS_AGGREGATED.kind, MetricKind::Counter);
        assert_eq!(metric_defs::POINTS_AGGREGATED.labels, &["zoom_level"]);
        assert_eq!(metric_defs::GENERATION_DURATION.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::GENERATION_DURATION.unit, Some(Unit::Milliseconds));
        assert_eq!(metric_defs::GENERATION_DATES.kind, MetricKind::Gauge);
    }

    #[test]
    fn test_all_metrics_unique() {
        let mut names: Vec<&str> = metric_defs::ALL.iter().map(|m| m.name).collect();
        assert_eq!(names.len(), 10);
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), metric_defs::ALL.len());
        assert!(names.iter().all(|n| n.starts_with("floodgrid.")));
    }

    #[test]
    fn test_metric_minimal() {
        const MINIMAL: Metric = Metric::counter("minimal");

        assert_eq!(MINIMAL.name, "minimal");
        assert_eq!(MINIMAL.kind, MetricKind::Counter);
        assert_eq!(MINIMAL.description, "");
        assert_eq!(MINIMAL.unit, None);
        assert_eq!(MINIMAL.labels, &[] as &[&str]);
    }
}
