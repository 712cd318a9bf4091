use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::{
    codec,
    histogram::{bucket_index, format_bound, HistogramSamplesBuilder},
    sample::zip_labels,
    storage::ensure_finite,
    KeyValueBackend, MetricFamilySamples, MetricKind, Sample, Storage, StorageError,
};

/// Key prefix used when none is configured.
pub const DEFAULT_KEY_PREFIX: &str = "prometheus_";

const METRICS_HASH_SUFFIX: &str = "metrics";
const META_HASH_SUFFIX: &str = "meta";

/// Trailing marker of the series field holding a histogram's observation count.
const HISTOGRAM_COUNT: &str = "count";
/// Trailing marker of the series field holding a histogram's observation sum.
const HISTOGRAM_SUM: &str = "sum";

/// Metadata of a metric name, as stored in the meta hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredMetadata {
    #[serde(rename = "type")]
    kind: MetricKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    buckets: Option<Vec<f64>>,
    help: String,
    labels_names: Vec<String>,
}

/// Builder for [`SharedStorage`].
#[derive(Debug, Clone)]
pub struct SharedStorageBuilder {
    prefix: String,
}

impl SharedStorageBuilder {
    /// Creates a new `SharedStorageBuilder` using [`DEFAULT_KEY_PREFIX`].
    pub fn new() -> SharedStorageBuilder {
        SharedStorageBuilder { prefix: DEFAULT_KEY_PREFIX.to_string() }
    }

    /// Sets the prefix of the two hash keys used in the backend.
    ///
    /// Values are stored under `<prefix>metrics`, and metadata under `<prefix>meta`.  Storages
    /// sharing a prefix on the same backend see each other's metrics.
    pub fn with_prefix<P: Into<String>>(mut self, prefix: P) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Builds the storage on top of the given backend.
    pub fn build<B: KeyValueBackend>(self, backend: B) -> SharedStorage<B> {
        SharedStorage {
            metrics_key: format!("{}{}", self.prefix, METRICS_HASH_SUFFIX),
            meta_key: format!("{}{}", self.prefix, META_HASH_SUFFIX),
            backend,
        }
    }
}

impl Default for SharedStorageBuilder {
    fn default() -> Self {
        SharedStorageBuilder::new()
    }
}

/// Stores metrics in a key-value store shared by any number of independent processes.
///
/// Two hashes are used.  The metrics hash maps every series, encoded with [`codec::encode`], to
/// its current value.  The meta hash maps every metric name to its type, help text, label names,
/// and histogram buckets.
///
/// Values are only ever changed through the atomic increment command, except for absolute gauge
/// updates, which overwrite the value and race with each other on a last-write-wins basis.
/// Metadata is written with set-if-absent, so whichever writer registers a metric name first
/// fixes its metadata until the storage is wiped.  Metadata written later with a different help
/// text or label schema is silently ignored.
///
/// Histograms are stored as one field per bucket, holding only the observations that landed in
/// that bucket, plus one field each for the count and the sum.  Cumulative bucket values are
/// rebuilt when collecting.
///
/// ## Consistency
///
/// No command spans more than one field, and nothing is locked.  `collect` therefore returns a
/// recent snapshot rather than an instantaneous one: updates landing while it runs may be
/// partially visible.
#[derive(Debug)]
pub struct SharedStorage<B> {
    backend: B,
    metrics_key: String,
    meta_key: String,
}

impl<B: KeyValueBackend> SharedStorage<B> {
    /// Creates a new `SharedStorage` using [`DEFAULT_KEY_PREFIX`].
    pub fn new(backend: B) -> SharedStorage<B> {
        SharedStorageBuilder::new().build(backend)
    }

    /// Gets a reference to the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Name of the hash holding series values.
    pub fn metrics_key(&self) -> &str {
        &self.metrics_key
    }

    /// Name of the hash holding metric metadata.
    pub fn meta_key(&self) -> &str {
        &self.meta_key
    }

    /// Registers the metadata of a metric name, unless some writer already did.
    fn store_meta(
        &self,
        name: &str,
        kind: MetricKind,
        buckets: Option<&[f64]>,
        help: &str,
        label_names: &[String],
    ) -> Result<(), StorageError> {
        let meta = StoredMetadata {
            kind,
            buckets: buckets.map(<[f64]>::to_vec),
            help: help.to_string(),
            labels_names: label_names.to_vec(),
        };
        let encoded = serde_json::to_string(&meta).map_err(|source| {
            StorageError::SerializeMetadata { name: name.to_string(), source }
        })?;

        if self.backend.hash_set_if_absent(&self.meta_key, name, &encoded)? {
            debug!(metric_name = name, kind = %meta.kind, "Registered metric metadata.");
        }
        Ok(())
    }

    fn increment(&self, field: &str, delta: f64) -> Result<(), StorageError> {
        self.backend.hash_increment_by_float(&self.metrics_key, field, delta)?;
        Ok(())
    }

    /// Deletes series whose metric has no metadata.
    ///
    /// Metadata is loaded again first: a metric registered by another writer since the start of
    /// the collection is not stale, and its series must survive.
    fn remove_stale(&self, stale: Vec<(String, String)>) -> Result<(), StorageError> {
        let metas = self.load_metas()?;
        let fields = stale
            .into_iter()
            .filter(|(name, _)| !metas.contains_key(name))
            .map(|(_, field)| field)
            .collect::<Vec<_>>();

        if !fields.is_empty() {
            debug!(stale_series = fields.len(), "Removing series without metadata.");
            self.backend.hash_delete(&self.metrics_key, &fields)?;
        }
        Ok(())
    }

    fn load_metas(&self) -> Result<HashMap<String, StoredMetadata>, StorageError> {
        self.backend
            .hash_get_all(&self.meta_key)?
            .into_iter()
            .map(|(name, encoded)| match serde_json::from_str::<StoredMetadata>(&encoded) {
                Ok(meta) => Ok((name, meta)),
                Err(source) => Err(StorageError::DecodeMetadata { name, source }),
            })
            .collect()
    }
}

impl<B: KeyValueBackend> Storage for SharedStorage<B> {
    fn update_counter(
        &self,
        name: &str,
        delta: f64,
        help: &str,
        label_names: &[String],
        label_values: &[String],
    ) -> Result<(), StorageError> {
        ensure_finite(name, delta)?;
        let field = codec::encode(name, label_values)?;
        self.store_meta(name, MetricKind::Counter, None, help, label_names)?;
        self.increment(&field, delta)
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
        let field = codec::encode(name, label_values)?;
        self.store_meta(name, MetricKind::Gauge, None, help, label_names)?;

        if value_is_delta {
            self.increment(&field, value)
        } else {
            self.backend.hash_set(&self.metrics_key, &field, &value.to_string())?;
            Ok(())
        }
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
        if buckets.is_empty() {
            return Err(StorageError::EmptyBuckets { name: name.to_string() });
        }
        // Checked before any write, since the sum is incremented last.
        ensure_finite(name, value)?;

        self.store_meta(name, MetricKind::Histogram, Some(buckets), help, label_names)?;

        let mut values = Vec::with_capacity(label_values.len() + 1);
        values.extend_from_slice(label_values);

        // Only the bucket the value lands in is touched; lower buckets are added in when
        // collecting.
        if let Some(idx) = bucket_index(buckets, value) {
            values.push(format_bound(buckets[idx]));
            self.increment(&codec::encode(name, &values)?, 1.0)?;
            values.pop();
        }

        values.push(HISTOGRAM_COUNT.to_string());
        self.increment(&codec::encode(name, &values)?, 1.0)?;
        values.pop();

        values.push(HISTOGRAM_SUM.to_string());
        self.increment(&codec::encode(name, &values)?, value)
    }

    fn collect(&self) -> Result<Vec<MetricFamilySamples>, StorageError> {
        let metas = self.load_metas()?;

        let mut stale = Vec::new();
        let mut simple: BTreeMap<String, Vec<Sample>> = BTreeMap::new();
        let mut histograms: BTreeMap<String, HistogramSamplesBuilder> = BTreeMap::new();

        for (field, raw) in self.backend.hash_get_all(&self.metrics_key)? {
            let (name, mut label_values) = codec::decode(&field)?;
            let meta = match metas.get(&name) {
                Some(meta) => meta,
                None => {
                    stale.push((name, field));
                    continue;
                }
            };

            match meta.kind {
                MetricKind::Histogram => {
                    let builder = histograms.entry(name.clone()).or_insert_with(|| {
                        HistogramSamplesBuilder::new(
                            name.as_str(),
                            meta.buckets.clone().unwrap_or_default(),
                            meta.help.as_str(),
                            meta.labels_names.clone(),
                        )
                    });

                    let marker = match label_values.pop() {
                        Some(marker) => marker,
                        None => return Err(StorageError::MissingBucketMarker { key: field }),
                    };

                    match marker.as_str() {
                        HISTOGRAM_SUM => builder.set_sum(parse_value(&field, &raw)?, label_values),
                        HISTOGRAM_COUNT => {
                            builder.set_count(parse_count(&field, &raw)?, label_values)
                        }
                        bound => {
                            let bound = bound.parse::<f64>().map_err(|_| {
                                StorageError::UnknownBucket {
                                    name: name.clone(),
                                    bound: bound.to_string(),
                                }
                            })?;
                            builder.fill_bucket(bound, parse_count(&field, &raw)?, label_values)?;
                        }
                    }
                }
                MetricKind::Counter | MetricKind::Gauge => {
                    let labels = zip_labels(&name, &meta.labels_names, &label_values)?;
                    let value = parse_value(&field, &raw)?;
                    simple.entry(name.clone()).or_default().push(Sample::new(name, value, labels));
                }
            }
        }

        if !stale.is_empty() {
            // Cleanup does not affect this snapshot, so a failure is only reported.
            if let Err(error) = self.remove_stale(stale) {
                warn!(%error, "Failed to remove series without metadata.");
            }
        }

        let mut families = Vec::with_capacity(simple.len() + histograms.len());
        for (name, samples) in simple {
            // Only names with metadata ever make it into `simple`.
            if let Some(meta) = metas.get(&name) {
                let help = meta.help.as_str();
                families.push(MetricFamilySamples::new(name, meta.kind, help, samples));
            }
        }
        for (_, builder) in histograms {
            families.push(builder.build()?);
        }
        families.sort_by(|a, b| a.name().cmp(b.name()));

        trace!(families = families.len(), "Collected metric families.");
        Ok(families)
    }

    fn wipe_storage(&self) -> Result<(), StorageError> {
        self.backend.del(&[self.meta_key.clone(), self.metrics_key.clone()])?;
        Ok(())
    }
}

fn parse_value(key: &str, raw: &str) -> Result<f64, StorageError> {
    raw.parse::<f64>()
        .map_err(|_| StorageError::InvalidValue { key: key.to_string(), value: raw.to_string() })
}

/// Parses a stored observation count, which is a float in the backend but must be a
/// non-negative whole number.
fn parse_count(key: &str, raw: &str) -> Result<u64, StorageError> {
    let value = parse_value(key, raw)?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(StorageError::InvalidValue { key: key.to_string(), value: raw.to_string() });
    }
    Ok(value as u64)
}
