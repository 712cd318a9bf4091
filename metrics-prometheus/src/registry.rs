use std::{collections::HashMap, fmt, sync::Arc};

use metrics_storage::{MetricFamilySamples, Storage, StorageError};
use parking_lot::Mutex;
use tracing::debug;

use crate::{Counter, Gauge, Histogram, ValidationError};

/// Hands out collectors and collects what they recorded.
pub trait Registry: Send + Sync {
    /// Gets or defines a counter.
    fn counter(&self, name: &str, help: &str, label_names: &[&str])
        -> Result<Counter, ValidationError>;

    /// Gets or defines a gauge.
    fn gauge(&self, name: &str, help: &str, label_names: &[&str]) -> Result<Gauge, ValidationError>;

    /// Gets or defines a histogram.
    fn histogram(
        &self,
        name: &str,
        buckets: &[f64],
        help: &str,
        label_names: &[&str],
    ) -> Result<Histogram, ValidationError>;

    /// Collects every metric family from the underlying storage.
    fn collect_metrics(&self) -> Result<Vec<MetricFamilySamples>, StorageError>;

    /// Removes every metric from the underlying storage.
    fn wipe_storage(&self) -> Result<(), StorageError>;
}

/// A [`Registry`] backed by a single [`Storage`].
///
/// Collectors are cached by name, separately for each kind of metric: the first definition of a
/// name wins, and asking for it again returns the cached collector regardless of the help text,
/// label names, or buckets given.
///
/// Since the caches are per kind, the same name can be defined as, say, both a counter and a gauge.
/// [`SharedStorage`][metrics_storage::SharedStorage] keeps a single set of metadata per name, so
/// there the family is reported under whichever kind reached storage first, and both collectors
/// write to the same series values.  Give every metric a distinct name.
pub struct CollectorRegistry {
    storage: Arc<dyn Storage>,
    counters: Mutex<HashMap<String, Counter>>,
    gauges: Mutex<HashMap<String, Gauge>>,
    histograms: Mutex<HashMap<String, Histogram>>,
}

impl CollectorRegistry {
    /// Creates a new `CollectorRegistry` over the given storage.
    pub fn new<S: Storage + 'static>(storage: S) -> CollectorRegistry {
        CollectorRegistry::from_arc(Arc::new(storage))
    }

    /// Creates a new `CollectorRegistry` over storage that is shared with other owners.
    pub fn from_arc(storage: Arc<dyn Storage>) -> CollectorRegistry {
        CollectorRegistry {
            storage,
            counters: Mutex::new(HashMap::new()),
            gauges: Mutex::new(HashMap::new()),
            histograms: Mutex::new(HashMap::new()),
        }
    }

    /// Gets a reference to the underlying storage.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }
}

impl fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("counters", &self.counters.lock().keys().collect::<Vec<_>>())
            .field("gauges", &self.gauges.lock().keys().collect::<Vec<_>>())
            .field("histograms", &self.histograms.lock().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Registry for CollectorRegistry {
    fn counter(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<Counter, ValidationError> {
        let mut counters = self.counters.lock();
        if let Some(counter) = counters.get(name) {
            return Ok(counter.clone());
        }

        let counter = Counter::new(self.storage.clone(), name, help, label_names)?;
        debug!(metric_name = name, "Defined counter.");
        counters.insert(name.to_string(), counter.clone());
        Ok(counter)
    }

    fn gauge(&self, name: &str, help: &str, label_names: &[&str]) -> Result<Gauge, ValidationError> {
        let mut gauges = self.gauges.lock();
        if let Some(gauge) = gauges.get(name) {
            return Ok(gauge.clone());
        }

        let gauge = Gauge::new(self.storage.clone(), name, help, label_names)?;
        debug!(metric_name = name, "Defined gauge.");
        gauges.insert(name.to_string(), gauge.clone());
        Ok(gauge)
    }

    fn histogram(
        &self,
        name: &str,
        buckets: &[f64],
        help: &str,
        label_names: &[&str],
    ) -> Result<Histogram, ValidationError> {
        let mut histograms = self.histograms.lock();
        if let Some(histogram) = histograms.get(name) {
            return Ok(histogram.clone());
        }

        let histogram = Histogram::new(self.storage.clone(), name, buckets, help, label_names)?;
        debug!(metric_name = name, buckets = buckets.len(), "Defined histogram.");
        histograms.insert(name.to_string(), histogram.clone());
        Ok(histogram)
    }

    fn collect_metrics(&self) -> Result<Vec<MetricFamilySamples>, StorageError> {
        self.storage.collect()
    }

    fn wipe_storage(&self) -> Result<(), StorageError> {
        self.storage.wipe_storage()
    }
}
