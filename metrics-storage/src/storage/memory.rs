use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::{
    histogram::{Histogram, HistogramSamplesBuilder},
    sample::zip_labels,
    storage::ensure_finite,
    MetricFamilySamples, MetricKind, Sample, Storage, StorageError,
};

#[derive(Debug)]
struct ValueFamily {
    help: String,
    label_names: Vec<String>,
    series: IndexMap<Vec<String>, f64>,
}

impl ValueFamily {
    fn new(help: &str, label_names: &[String]) -> Self {
        ValueFamily {
            help: help.to_string(),
            label_names: label_names.to_vec(),
            series: IndexMap::new(),
        }
    }

    fn series_mut(&mut self, label_values: &[String]) -> &mut f64 {
        match self.series.get_index_of(label_values) {
            Some(idx) => &mut self.series[idx],
            None => self.series.entry(label_values.to_vec()).or_insert(0.0),
        }
    }

    fn to_family(
        &self,
        name: &str,
        kind: MetricKind,
    ) -> Result<MetricFamilySamples, StorageError> {
        let samples = self
            .series
            .iter()
            .map(|(label_values, value)| {
                zip_labels(name, &self.label_names, label_values)
                    .map(|labels| Sample::new(name, *value, labels))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MetricFamilySamples::new(name, kind, self.help.as_str(), samples))
    }
}

#[derive(Debug)]
struct HistogramFamily {
    help: String,
    label_names: Vec<String>,
    buckets: Vec<f64>,
    series: IndexMap<Vec<String>, Histogram>,
}

#[derive(Debug, Default)]
struct Inner {
    counters: IndexMap<String, ValueFamily>,
    gauges: IndexMap<String, ValueFamily>,
    histograms: IndexMap<String, HistogramFamily>,
}

/// Stores metrics in the memory of the current process.
///
/// Series are keyed by their label tuple directly, so label values may contain any character.
/// Families are collected in the order they were first updated: counters first, then gauges,
/// then histograms.
///
/// Each call is applied under a single lock, so `collect` never observes a half-applied update
/// and `wipe_storage` is atomic from the point of view of other callers.  Nothing beyond a single
/// call is synchronized: callers that need several updates to be observed together have to
/// coordinate that themselves.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    inner: Mutex<Inner>,
}

impl InMemoryStorage {
    /// Creates a new, empty `InMemoryStorage`.
    pub fn new() -> InMemoryStorage {
        InMemoryStorage::default()
    }
}

impl Storage for InMemoryStorage {
    fn update_counter(
        &self,
        name: &str,
        delta: f64,
        help: &str,
        label_names: &[String],
        label_values: &[String],
    ) -> Result<(), StorageError> {
        ensure_finite(name, delta)?;

        let mut inner = self.inner.lock();
        let family = inner
            .counters
            .entry(name.to_string())
            .or_insert_with(|| ValueFamily::new(help, label_names));

        *family.series_mut(label_values) += delta;
        Ok(())
    }

    fn update_gauge(
        &self,
        name: &str,
        value: f64,
        value_is_delta: bool,
        help: &str,
        label_names: &[String],
        label_values: &[String],
    ) -> Result<(), StorageError> {
        if value_is_delta {
            ensure_finite(name, value)?;
        }

        let mut inner = self.inner.lock();
        let family = inner
            .gauges
            .entry(name.to_string())
            .or_insert_with(|| ValueFamily::new(help, label_names));

        let current = family.series_mut(label_values);
        if value_is_delta {
            *current += value;
        } else {
            *current = value;
        }
        Ok(())
    }

    fn update_histogram(
        &self,
        name: &str,
        value: f64,
        buckets: &[f64],
        help: &str,
        label_names: &[String],
        label_values: &[String],
    ) -> Result<(), StorageError> {
        ensure_finite(name, value)?;

        let mut inner = self.inner.lock();
        let family = inner.histograms.entry(name.to_string()).or_insert_with(|| HistogramFamily {
            help: help.to_string(),
            label_names: label_names.to_vec(),
            buckets: buckets.to_vec(),
            series: IndexMap::new(),
        });

        let histogram = match family.series.get_index_of(label_values) {
            Some(idx) => &mut family.series[idx],
            None => {
                let histogram = Histogram::new(&family.buckets)
                    .ok_or_else(|| StorageError::EmptyBuckets { name: name.to_string() })?;
                family.series.entry(label_values.to_vec()).or_insert(histogram)
            }
        };

        histogram.record(value);
        Ok(())
    }

    fn collect(&self) -> Result<Vec<MetricFamilySamples>, StorageError> {
        let inner = self.inner.lock();
        let mut families =
            Vec::with_capacity(inner.counters.len() + inner.gauges.len() + inner.histograms.len());

        for (name, family) in &inner.counters {
            families.push(family.to_family(name, MetricKind::Counter)?);
        }

        for (name, family) in &inner.gauges {
            families.push(family.to_family(name, MetricKind::Gauge)?);
        }

        for (name, family) in &inner.histograms {
            let mut builder = HistogramSamplesBuilder::new(
                name.as_str(),
                family.buckets.clone(),
                family.help.as_str(),
                family.label_names.clone(),
            );

            for (label_values, histogram) in &family.series {
                builder.set_sum(histogram.sum(), label_values.clone());
                builder.set_count(histogram.count(), label_values.clone());
                for (bound, value) in histogram.buckets() {
                    builder.fill_bucket(bound, value, label_values.clone())?;
                }
            }

            families.push(builder.build()?);
        }

        Ok(families)
    }

    fn wipe_storage(&self) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner.counters.clear();
        inner.gauges.clear();
        inner.histograms.clear();
        Ok(())
    }
}
