use std::fmt;

use serde::{Deserialize, Serialize};

/// Metric kind.
///
/// Defines the kind, or type, of a metric family.  Follows the metric types supported by the
/// Prometheus text exposition format that this crate stores:
/// - counters
/// - gauges
/// - histograms
///
/// The serialized form is the lowercase type name, which is also what ends up on the `# TYPE`
/// line of the exposition output.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Counter type.
    Counter,
    /// Gauge type.
    Gauge,
    /// Histogram type.
    Histogram,
}

impl MetricKind {
    /// Gets the type name as used in the exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
