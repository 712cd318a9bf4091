//! Helper functions and types related to histogram data.
use indexmap::IndexMap;

use crate::{sample::zip_labels, Label, MetricFamilySamples, MetricKind, Sample, StorageError};

/// Name of the synthetic label carrying a bucket's upper bound.
pub const LE_LABEL: &str = "le";

/// Bound of the implicit last bucket.
pub const INF_BOUND: &str = "+Inf";

/// Formats a bucket boundary the same way everywhere it is written.
///
/// The output of `f64`'s `Display` is the shortest string that parses back to the same value,
/// so a boundary written into a series key can be matched exactly when read back.
pub fn format_bound(bound: f64) -> String {
    bound.to_string()
}

/// Finds the index of the bucket an observation belongs to.
///
/// This is the first bound not smaller than `value`.  Returns `None` when the value exceeds
/// every bound, in which case it is only accounted for by the implicit `+Inf` bucket.
pub fn bucket_index(bounds: &[f64], value: f64) -> Option<usize> {
    bounds.iter().position(|bound| value <= *bound)
}

/// Per-series histogram state.
///
/// Unlike a rendered histogram, each bucket only counts the observations that landed in its own
/// range: greater than the previous bound, and less than or equal to its own bound.  Cumulative
/// values are produced by [`HistogramSamplesBuilder`].
#[derive(Debug, Clone)]
pub struct Histogram {
    count: u64,
    bounds: Vec<f64>,
    buckets: Vec<u64>,
    sum: f64,
}

impl Histogram {
    /// Creates a new `Histogram`.
    ///
    /// If `bounds` is empty, returns `None`.
    pub fn new(bounds: &[f64]) -> Option<Histogram> {
        if bounds.is_empty() {
            return None;
        }

        let buckets = vec![0u64; bounds.len()];

        Some(Histogram { count: 0, bounds: Vec::from(bounds), buckets, sum: 0.0 })
    }

    /// Gets the sum of all samples.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Gets the sample count.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Gets the buckets.
    ///
    /// Buckets are tuples, where the first element is the bucket limit itself, and the second
    /// element is the count of samples that landed in that bucket alone.
    pub fn buckets(&self) -> Vec<(f64, u64)> {
        self.bounds.iter().cloned().zip(self.buckets.iter().cloned()).collect()
    }

    /// Records a single sample.
    pub fn record(&mut self, sample: f64) {
        self.sum += sample;
        self.count += 1;

        if let Some(idx) = bucket_index(&self.bounds, sample) {
            self.buckets[idx] += 1;
        }
    }
}

#[derive(Debug)]
struct BucketGroup {
    count: u64,
    sum: f64,
    buckets: Vec<u64>,
}

/// Builds the samples of one histogram family out of raw, per-bucket counts.
///
/// Counts, sums, and bucket values can be fed in any order, for any number of label tuples.
/// Label tuples are grouped by value, so two separately-allocated but equal tuples land in the
/// same series.
#[derive(Debug)]
pub struct HistogramSamplesBuilder {
    name: String,
    help: String,
    label_names: Vec<String>,
    bounds: Vec<f64>,
    groups: IndexMap<Vec<String>, BucketGroup>,
}

impl HistogramSamplesBuilder {
    /// Creates a new `HistogramSamplesBuilder`.
    pub fn new<N, H>(name: N, bounds: Vec<f64>, help: H, label_names: Vec<String>) -> Self
    where
        N: Into<String>,
        H: Into<String>,
    {
        HistogramSamplesBuilder {
            name: name.into(),
            help: help.into(),
            label_names,
            bounds,
            groups: IndexMap::new(),
        }
    }

    /// Sets the total observation count of a series.
    pub fn set_count(&mut self, count: u64, label_values: Vec<String>) {
        self.group_mut(label_values).count = count;
    }

    /// Sets the sum of all observations of a series.
    pub fn set_sum(&mut self, sum: f64, label_values: Vec<String>) {
        self.group_mut(label_values).sum = sum;
    }

    /// Sets the non-cumulative count of a single bucket of a series.
    ///
    /// # Errors
    ///
    /// If `bound` is not exactly one of the configured bounds, an error is returned and the
    /// builder is left untouched.
    pub fn fill_bucket(
        &mut self,
        bound: f64,
        value: u64,
        label_values: Vec<String>,
    ) -> Result<(), StorageError> {
        let idx = match self.bounds.iter().position(|b| *b == bound) {
            Some(idx) => idx,
            None => {
                return Err(StorageError::UnknownBucket {
                    name: self.name.clone(),
                    bound: format_bound(bound),
                })
            }
        };

        self.group_mut(label_values).buckets[idx] = value;
        Ok(())
    }

    /// Consumes the builder, producing the samples of every series seen so far.
    ///
    /// For each series, one cumulative `_bucket` sample is emitted per bound, followed by the
    /// `+Inf` bucket (equal to the series count), `_count`, and `_sum`.
    pub fn build(self) -> Result<MetricFamilySamples, StorageError> {
        let bucket_name = format!("{}_bucket", self.name);
        let count_name = format!("{}_count", self.name);
        let sum_name = format!("{}_sum", self.name);

        let mut samples = Vec::with_capacity(self.groups.len() * (self.bounds.len() + 3));
        for (label_values, group) in self.groups {
            let labels = zip_labels(&self.name, &self.label_names, &label_values)?;

            let mut acc = 0u64;
            for (bound, value) in self.bounds.iter().zip(group.buckets.iter()) {
                acc += *value;
                samples.push(Sample::new(
                    bucket_name.as_str(),
                    acc as f64,
                    with_le(&labels, format_bound(*bound)),
                ));
            }

            samples.push(Sample::new(
                bucket_name.as_str(),
                group.count as f64,
                with_le(&labels, INF_BOUND.to_string()),
            ));
            samples.push(Sample::new(count_name.as_str(), group.count as f64, labels.clone()));
            samples.push(Sample::new(sum_name.as_str(), group.sum, labels));
        }

        Ok(MetricFamilySamples::new(self.name, MetricKind::Histogram, self.help, samples))
    }

    fn group_mut(&mut self, label_values: Vec<String>) -> &mut BucketGroup {
        let bucket_count = self.bounds.len();
        self.groups.entry(label_values).or_insert_with(|| BucketGroup {
            count: 0,
            sum: 0.0,
            buckets: vec![0; bucket_count],
        })
    }
}

fn with_le(labels: &[Label], bound: String) -> Vec<Label> {
    let mut labels = labels.to_vec();
    labels.push(Label::new(LE_LABEL, bound));
    labels
}
