use std::{fmt, sync::Arc};

use metrics_storage::Storage;

use crate::common::{
    validate_buckets, validate_finite, validate_label_name, validate_metric_name, Error,
    ValidationError, LE_LABEL,
};

/// Default histogram buckets, suited to request latencies measured in seconds.
pub const DEFAULT_BUCKETS: [f64; 14] =
    [0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0];

/// Name, help text, and label names shared by every kind of collector.
#[derive(Debug)]
struct Descriptor {
    name: String,
    help: String,
    label_names: Vec<String>,
}

impl Descriptor {
    fn new(name: &str, help: &str, label_names: &[&str]) -> Result<Descriptor, ValidationError> {
        validate_metric_name(name)?;
        for label in label_names {
            validate_label_name(label)?;
        }

        Ok(Descriptor {
            name: name.to_string(),
            help: help.to_string(),
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
        })
    }

    /// Checks that one value was given for every label name.
    fn label_values(&self, label_values: &[&str]) -> Result<Vec<String>, ValidationError> {
        if label_values.len() != self.label_names.len() {
            return Err(ValidationError::LabelCardinality {
                name: self.name.clone(),
                expected: self.label_names.len(),
                found: label_values.len(),
            });
        }

        Ok(label_values.iter().map(|v| v.to_string()).collect())
    }
}

macro_rules! impl_descriptor_accessors {
    ($ty:ident) => {
        impl $ty {
            /// Gets the name of this metric.
            pub fn name(&self) -> &str {
                &self.desc.name
            }

            /// Gets the help text of this metric.
            pub fn help(&self) -> &str {
                &self.desc.help
            }

            /// Gets the label names of this metric.
            pub fn label_names(&self) -> &[String] {
                &self.desc.label_names
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty)).field("desc", &self.desc).finish_non_exhaustive()
            }
        }
    };
}

/// A monotonically increasing value.
///
/// Handles are cheap to clone, and clones update the same metric.
#[derive(Clone)]
pub struct Counter {
    desc: Arc<Descriptor>,
    storage: Arc<dyn Storage>,
}

impl Counter {
    /// Creates a new `Counter` writing to the given storage.
    ///
    /// # Errors
    ///
    /// If the metric name or any of the label names are invalid, an error is returned.
    pub fn new(
        storage: Arc<dyn Storage>,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<Counter, ValidationError> {
        let desc = Descriptor::new(name, help, label_names)?;
        Ok(Counter { desc: Arc::new(desc), storage })
    }

    /// Increments the counter by `delta`.
    ///
    /// # Errors
    ///
    /// If `delta` is negative, NaN, or infinite, or if the number of label values does not match
    /// the number of label names, a validation error is returned and nothing is recorded.  Storage
    /// failures are passed through.
    pub fn inc(&self, delta: f64, label_values: &[&str]) -> Result<(), Error> {
        validate_finite(delta)?;
        if delta < 0.0 {
            return Err(ValidationError::NegativeIncrement(delta).into());
        }

        let label_values = self.desc.label_values(label_values)?;
        self.storage.update_counter(
            &self.desc.name,
            delta,
            &self.desc.help,
            &self.desc.label_names,
            &label_values,
        )?;
        Ok(())
    }

    /// Increments the counter by one.
    pub fn inc_by_one(&self, label_values: &[&str]) -> Result<(), Error> {
        self.inc(1.0, label_values)
    }
}

impl_descriptor_accessors!(Counter);

/// A value that can go up and down.
///
/// Handles are cheap to clone, and clones update the same metric.
#[derive(Clone)]
pub struct Gauge {
    desc: Arc<Descriptor>,
    storage: Arc<dyn Storage>,
}

impl Gauge {
    /// Creates a new `Gauge` writing to the given storage.
    ///
    /// # Errors
    ///
    /// If the metric name or any of the label names are invalid, an error is returned.
    pub fn new(
        storage: Arc<dyn Storage>,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<Gauge, ValidationError> {
        let desc = Descriptor::new(name, help, label_names)?;
        Ok(Gauge { desc: Arc::new(desc), storage })
    }

    /// Sets the gauge to `value`.
    ///
    /// Any value is accepted, including NaN and infinities.
    pub fn set(&self, value: f64, label_values: &[&str]) -> Result<(), Error> {
        self.update(value, false, label_values)
    }

    /// Increments the gauge by `delta`.
    ///
    /// # Errors
    ///
    /// If `delta` is NaN or infinite, a validation error is returned and nothing is recorded.
    pub fn inc(&self, delta: f64, label_values: &[&str]) -> Result<(), Error> {
        self.update(delta, true, label_values)
    }

    /// Decrements the gauge by `delta`.
    pub fn dec(&self, delta: f64, label_values: &[&str]) -> Result<(), Error> {
        self.update(-delta, true, label_values)
    }

    fn update(&self, value: f64, value_is_delta: bool, label_values: &[&str]) -> Result<(), Error> {
        if value_is_delta {
            validate_finite(value)?;
        }
        let label_values = self.desc.label_values(label_values)?;
        self.storage.update_gauge(
            &self.desc.name,
            value,
            value_is_delta,
            &self.desc.help,
            &self.desc.label_names,
            &label_values,
        )?;
        Ok(())
    }
}

impl_descriptor_accessors!(Gauge);

/// Samples observations into a fixed set of buckets.
///
/// Handles are cheap to clone, and clones update the same metric.
#[derive(Clone)]
pub struct Histogram {
    desc: Arc<Descriptor>,
    buckets: Arc<[f64]>,
    storage: Arc<dyn Storage>,
}

impl Histogram {
    /// Creates a new `Histogram` writing to the given storage.
    ///
    /// `buckets` are the upper bounds of each bucket, excluding the implicit `+Inf` bucket.
    ///
    /// # Errors
    ///
    /// If the metric name or any of the label names are invalid, if a label is named `le`, or if
    /// `buckets` is empty, not strictly increasing, or contains a non-finite bound, an error is
    /// returned.
    pub fn new(
        storage: Arc<dyn Storage>,
        name: &str,
        buckets: &[f64],
        help: &str,
        label_names: &[&str],
    ) -> Result<Histogram, ValidationError> {
        let desc = Descriptor::new(name, help, label_names)?;
        validate_buckets(buckets)?;
        if label_names.contains(&LE_LABEL) {
            return Err(ValidationError::ReservedLeLabel);
        }

        Ok(Histogram { desc: Arc::new(desc), buckets: Arc::from(buckets), storage })
    }

    /// Gets the bucket upper bounds of this histogram.
    pub fn buckets(&self) -> &[f64] {
        &self.buckets
    }

    /// Records an observation.
    ///
    /// Values above the largest bound are only counted in the `+Inf` bucket.
    ///
    /// # Errors
    ///
    /// If `value` is NaN or infinite, or if the number of label values does not match the number
    /// of label names, a validation error is returned and nothing is recorded.
    pub fn observe(&self, value: f64, label_values: &[&str]) -> Result<(), Error> {
        validate_finite(value)?;
        let label_values = self.desc.label_values(label_values)?;
        self.storage.update_histogram(
            &self.desc.name,
            value,
            &self.buckets,
            &self.desc.help,
            &self.desc.label_names,
            &label_values,
        )?;
        Ok(())
    }
}

impl_descriptor_accessors!(Histogram);
