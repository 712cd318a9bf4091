//! Point-in-time samples handed to renderers.

use crate::{MetricKind, StorageError};

/// A single label, in the form of a name/value pair.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct Label(String, String);

impl Label {
    /// Creates a [`Label`] from a name and value.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Label(key.into(), value.into())
    }

    /// Name of this label.
    pub fn key(&self) -> &str {
        self.0.as_str()
    }

    /// Value of this label.
    pub fn value(&self) -> &str {
        self.1.as_str()
    }

    /// Consumes this [`Label`], returning the name and value.
    pub fn into_parts(self) -> (String, String) {
        (self.0, self.1)
    }
}

/// An emitted value ready for rendering.
///
/// Labels keep the order of the metric's label schema, with any synthetic label (such as `le`)
/// appended last.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    name: String,
    value: f64,
    labels: Vec<Label>,
}

impl Sample {
    /// Creates a new `Sample`.
    pub fn new<N: Into<String>>(name: N, value: f64, labels: Vec<Label>) -> Sample {
        Sample { name: name.into(), value, labels }
    }

    /// Name of the sample, including any suffix such as `_bucket`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of the sample.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Labels of the sample.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }
}

/// All samples belonging to a single metric name, along with its type and help text.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricFamilySamples {
    name: String,
    kind: MetricKind,
    help: String,
    samples: Vec<Sample>,
}

impl MetricFamilySamples {
    /// Creates a new `MetricFamilySamples`.
    pub fn new<N, H>(name: N, kind: MetricKind, help: H, samples: Vec<Sample>) -> Self
    where
        N: Into<String>,
        H: Into<String>,
    {
        MetricFamilySamples { name: name.into(), kind, help: help.into(), samples }
    }

    /// Name of the metric family.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind of the metric family.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Help text, possibly empty.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Samples, in emission order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Consumes the family, returning its samples.
    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

/// Pairs a label-name schema with a label tuple.
///
/// The tuple must be exactly as long as the schema; anything else means the stored series and
/// the registered metadata disagree about the metric's labels.
pub(crate) fn zip_labels(
    name: &str,
    label_names: &[String],
    label_values: &[String],
) -> Result<Vec<Label>, StorageError> {
    if label_names.len() != label_values.len() {
        return Err(StorageError::LabelMismatch {
            name: name.to_string(),
            expected: label_names.len(),
            found: label_values.len(),
        });
    }

    Ok(label_names
        .iter()
        .zip(label_values.iter())
        .map(|(key, value)| Label::new(key.as_str(), value.as_str()))
        .collect())
}
