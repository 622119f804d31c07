//! Metrics for the hazlab hazard data cache.
//!
//! Every metric the cache and the store clients emit is declared here as a
//! const [`Metric`], so names and label keys live in one place. The crate
//! re-exports `metrics` so callers do not need a separate dependency.
//!
//! # Example
//!
//! ```rust
//! use hazlab_metrics::{metric_defs, QueryLabels};
//!
//! let labels = QueryLabels::new("NSHM_v1.0.4", "aggregate");
//! metrics::counter!(metric_defs::STORE_QUERIES.name, &labels.to_labels()).increment(1);
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
/// use hazlab_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const LOOKUPS: Metric = Metric::counter("hazlab.example.lookups")
///     .with_description("Lookups performed")
///     .with_unit(Unit::Count)
///     .with_labels(&["hazard_id"]);
///
/// assert_eq!(LOOKUPS.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "hazlab.cache.hits").
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys.
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

    /// Creates a new counter metric.
    pub const fn counter(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Counter)
    }

    /// Creates a new gauge metric.
    pub const fn gauge(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Gauge)
    }

    /// Creates a new histogram metric.
    pub const fn histogram(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Histogram)
    }

    /// Sets the description.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description)
            }
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

/// All metric definitions for the hazard data cache.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Labels present on every hazard-model scoped metric.
    pub const MODEL_LABELS: &[&str] = &["hazard_id"];

    /// Labels on remote store query metrics.
    pub const QUERY_LABELS: &[&str] = &["hazard_id", "kind"];

    // ========================================================================
    // Lazy curve cache
    // ========================================================================

    /// Curve lookups answered from memory.
    pub const CACHE_HITS: Metric = Metric::counter("hazlab.cache.hits")
        .with_description("Curve lookups served from the in-memory cache")
        .with_unit(Unit::Count)
        .with_labels(MODEL_LABELS);

    /// Curve lookups that required a batched remote query.
    pub const CACHE_MISSES: Metric = Metric::counter("hazlab.cache.misses")
        .with_description("Curve lookups that triggered a remote query")
        .with_unit(Unit::Count)
        .with_labels(MODEL_LABELS);

    /// Entries written into the cache by batched fetches.
    pub const CACHE_ENTRIES_INSERTED: Metric = Metric::counter("hazlab.cache.entries_inserted")
        .with_description("Curve entries inserted by batched fetches")
        .with_unit(Unit::Count)
        .with_labels(MODEL_LABELS);

    /// Current number of cached curves.
    pub const CACHE_ENTRIES: Metric = Metric::gauge("hazlab.cache.entries")
        .with_description("Curves currently held in the cache")
        .with_unit(Unit::Count)
        .with_labels(MODEL_LABELS);

    // ========================================================================
    // Remote store
    // ========================================================================

    /// Curve queries issued to the remote store.
    ///
    /// Labels: hazard_id, kind (realization | aggregate)
    pub const STORE_QUERIES: Metric = Metric::counter("hazlab.store.queries")
        .with_description("Curve queries issued to the hazard store")
        .with_unit(Unit::Count)
        .with_labels(QUERY_LABELS);

    /// Wall time of curve queries.
    pub const STORE_QUERY_DURATION: Metric = Metric::histogram("hazlab.store.query_duration")
        .with_description("Time spent waiting on hazard store curve queries")
        .with_unit(Unit::Seconds)
        .with_labels(QUERY_LABELS);

    /// Metadata records fetched.
    pub const METADATA_FETCHES: Metric = Metric::counter("hazlab.metadata.fetches")
        .with_description("Hazard metadata records fetched from the store")
        .with_unit(Unit::Count)
        .with_labels(MODEL_LABELS);

    /// Every metric, for bulk registration.
    pub const ALL: &[&Metric] = &[
        &CACHE_HITS,
        &CACHE_MISSES,
        &CACHE_ENTRIES_INSERTED,
        &CACHE_ENTRIES,
        &STORE_QUERIES,
        &STORE_QUERY_DURATION,
        &METADATA_FETCHES,
    ];
}

/// Label set for store query metrics.
#[derive(Debug, Clone)]
pub struct QueryLabels {
    pub hazard_id: String,
    pub kind: String,
}

impl QueryLabels {
    pub fn new(hazard_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            hazard_id: hazard_id.into(),
            kind: kind.into(),
        }
    }

    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("hazard_id", self.hazard_id.clone()), ("kind", self.kind.clone())]
    }
}

/// Labels for metrics scoped to a single hazard model.
pub fn model_labels(hazard_id: &str) -> Vec<(&'static str, String)> {
    vec![("hazard_id", hazard_id.to_string())]
}

/// Register descriptions for every metric in [`metric_defs::ALL`].
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Install a Prometheus exporter listening on `addr` and describe all metrics.
#[cfg(feature = "prometheus")]
pub fn install_prometheus(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_labels() {
        let labels = QueryLabels::new("NSHM_v1.0.4", "realization").to_labels();
        assert_eq!(labels.len(), 2);
        assert!(labels.contains(&("hazard_id", "NSHM_v1.0.4".to_string())));
        assert!(labels.contains(&("kind", "realization".to_string())));
    }

    #[test]
    fn test_metric_labels_match_declarations() {
        let labels = QueryLabels::new("a", "b").to_labels();
        let keys: Vec<&str> = labels.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, metric_defs::STORE_QUERIES.labels);

        let keys: Vec<&str> = model_labels("a").iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, metric_defs::CACHE_HITS.labels);
    }

    #[test]
    fn test_all_names_unique_and_namespaced() {
        let mut names: Vec<&str> = metric_defs::ALL.iter().map(|m| m.name).collect();
        assert!(names.iter().all(|n| n.starts_with("hazlab.")));
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), metric_defs::ALL.len());
    }

    #[test]
    fn test_describe_without_recorder() {
        // No recorder installed: describing is a no-op and must not panic.
        describe_metrics();
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(MetricKind::Histogram.to_string(), "histogram");
        assert_eq!(metric_defs::STORE_QUERY_DURATION.kind, MetricKind::Histogram);
    }
}
