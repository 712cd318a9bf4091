//! Storage backends for metric values.

mod memory;
pub use memory::InMemoryStorage;

mod shared;
pub use shared::{SharedStorage, SharedStorageBuilder, DEFAULT_KEY_PREFIX};

use crate::{MetricFamilySamples, StorageError};

/// Defines where metric values live and how they are aggregated.
///
/// Implementations receive updates that have already been validated: metric and label names are
/// well-formed, the label tuple has exactly as many values as there are label names, and
/// histogram buckets are non-empty and strictly increasing.  They do not need to validate any of
/// this again, but must accept arbitrary label value contents.
///
/// Metadata (help text, label names, and buckets) is fixed by the first update seen for a metric
/// name.  Later updates carrying different metadata are applied to the series they address, but
/// do not change what was registered.
pub trait Storage: Send + Sync {
    /// Adds `delta` to a counter series.
    ///
    /// No sign check happens here.  A NaN or infinite `delta` is rejected with
    /// [`StorageError::NonFiniteValue`] before anything is written.
    fn update_counter(
        &self,
        name: &str,
        delta: f64,
        help: &str,
        label_names: &[String],
        label_values: &[String],
    ) -> Result<(), StorageError>;

    /// Updates a gauge series.
    ///
    /// When `value_is_delta` is `true`, `value` is added to the current value, otherwise it
    /// replaces it.  A NaN or infinite delta is rejected with [`StorageError::NonFiniteValue`];
    /// an absolute value may be anything.
    fn update_gauge(
        &self,
        name: &str,
        value: f64,
        value_is_delta: bool,
        help: &str,
        label_names: &[String],
        label_values: &[String],
    ) -> Result<(), StorageError>;

    /// Records an observation in a histogram series.
    ///
    /// Only the first bucket whose bound is not smaller than `value` is incremented; cumulative
    /// values are computed when collecting.  `buckets` never contains the implicit `+Inf` bound,
    /// and `label_names` never contains `le`.  A NaN or infinite `value` is rejected with
    /// [`StorageError::NonFiniteValue`] before any field is touched.
    fn update_histogram(
        &self,
        name: &str,
        value: f64,
        buckets: &[f64],
        help: &str,
        label_names: &[String],
        label_values: &[String],
    ) -> Result<(), StorageError>;

    /// Collects every stored metric family.
    fn collect(&self) -> Result<Vec<MetricFamilySamples>, StorageError>;

    /// Removes every stored metric, including its metadata.
    fn wipe_storage(&self) -> Result<(), StorageError>;
}

pub(crate) fn ensure_finite(name: &str, value: f64) -> Result<(), StorageError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StorageError::NonFiniteValue { name: name.to_string(), value })
    }
}
