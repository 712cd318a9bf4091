use metrics_storage::StorageError;
use thiserror::Error as ThisError;

use crate::formatting::{
    valid_label_name_character, valid_label_name_start_character, valid_metric_name_character,
    valid_metric_name_start_character,
};

/// Label name reserved for histogram bucket boundaries.
pub(crate) const LE_LABEL: &str = "le";

/// Errors raised when a metric is defined or updated with invalid arguments.
///
/// These are caller mistakes: nothing has been written to storage when one is returned.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum ValidationError {
    /// The metric name does not match `[a-zA-Z_:][a-zA-Z0-9_:]*`.
    #[error("invalid metric name: `{0}`")]
    InvalidMetricName(String),

    /// A label name does not match `[a-zA-Z_][a-zA-Z0-9_]*`.
    #[error("invalid label name: `{0}`")]
    InvalidLabelName(String),

    /// A label name starts with `__`, which is reserved for internal use.
    #[error("label name `{0}` is reserved for internal use")]
    ReservedLabelName(String),

    /// A histogram declared a label named `le`.
    #[error("histograms cannot have a label named `le`")]
    ReservedLeLabel,

    /// The number of label values does not match the number of label names.
    #[error("metric `{name}` defines {expected} label names but {found} label values were given")]
    LabelCardinality {
        /// Metric name.
        name: String,
        /// Number of label names the metric was defined with.
        expected: usize,
        /// Number of label values given.
        found: usize,
    },

    /// A counter was incremented by a negative amount.
    #[error("counters can only be incremented by non-negative amounts, got {0}")]
    NegativeIncrement(f64),

    /// An increment or observation was NaN or infinite.
    #[error("metrics can only record finite values, got {0}")]
    NonFiniteValue(f64),

    /// A histogram was defined without buckets.
    #[error("histograms must define at least one bucket")]
    EmptyBuckets,

    /// A histogram bucket boundary is NaN or infinite.
    #[error("histogram bucket boundaries must be finite, got {0}")]
    NonFiniteBucket(f64),

    /// Histogram bucket boundaries are not strictly increasing.
    #[error("histogram buckets must be in increasing order: {0} >= {1}")]
    NonIncreasingBuckets(f64, f64),
}

/// Errors that could occur while updating or collecting metrics.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The arguments of the call were invalid.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The underlying storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub(crate) fn validate_metric_name(name: &str) -> Result<(), ValidationError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) => valid_metric_name_start_character(c) && chars.all(valid_metric_name_character),
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidMetricName(name.to_string()))
    }
}

pub(crate) fn validate_label_name(label: &str) -> Result<(), ValidationError> {
    let mut chars = label.chars();
    let valid = match chars.next() {
        Some(c) => valid_label_name_start_character(c) && chars.all(valid_label_name_character),
        None => false,
    };

    if !valid {
        return Err(ValidationError::InvalidLabelName(label.to_string()));
    }
    if label.starts_with("__") {
        return Err(ValidationError::ReservedLabelName(label.to_string()));
    }
    Ok(())
}

pub(crate) fn validate_finite(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFiniteValue(value))
    }
}

pub(crate) fn validate_buckets(buckets: &[f64]) -> Result<(), ValidationError> {
    if buckets.is_empty() {
        return Err(ValidationError::EmptyBuckets);
    }
    if let Some(bucket) = buckets.iter().find(|b| !b.is_finite()) {
        return Err(ValidationError::NonFiniteBucket(*bucket));
    }
    if let Some(pair) = buckets.windows(2).find(|pair| pair[0] >= pair[1]) {
        return Err(ValidationError::NonIncreasingBuckets(pair[0], pair[1]));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_buckets, validate_label_name, validate_metric_name, ValidationError};

    #[test]
    fn test_validate_metric_name() {
        for name in &["requests_total", "_hidden", "ns:requests", "a1", ":"] {
            assert_eq!(validate_metric_name(name), Ok(()), "`{}` should be valid", name);
        }

        for name in &["", "1requests", "http.requests", "with space", "dash-ed", "ünïcode"] {
            assert_eq!(
                validate_metric_name(name),
                Err(ValidationError::InvalidMetricName(name.to_string())),
            );
        }
    }

    #[test]
    fn test_validate_label_name() {
        for label in &["method", "_private", "le", "status_code2"] {
            assert_eq!(validate_label_name(label), Ok(()), "`{}` should be valid", label);
        }

        for label in &["", "2xx", "name:space", "a.b"] {
            assert_eq!(
                validate_label_name(label),
                Err(ValidationError::InvalidLabelName(label.to_string())),
            );
        }

        assert_eq!(
            validate_label_name("__name__"),
            Err(ValidationError::ReservedLabelName("__name__".to_string())),
        );
    }

    #[test]
    fn test_validate_buckets() {
        assert_eq!(validate_buckets(&[0.1]), Ok(()));
        assert_eq!(validate_buckets(&[-1.0, 0.0, 1.0]), Ok(()));

        assert_eq!(validate_buckets(&[]), Err(ValidationError::EmptyBuckets));
        assert_eq!(
            validate_buckets(&[0.1, 0.5, 0.5]),
            Err(ValidationError::NonIncreasingBuckets(0.5, 0.5)),
        );
        assert_eq!(
            validate_buckets(&[1.0, 0.5]),
            Err(ValidationError::NonIncreasingBuckets(1.0, 0.5)),
        );
        assert_eq!(
            validate_buckets(&[0.1, f64::INFINITY]),
            Err(ValidationError::NonFiniteBucket(f64::INFINITY)),
        );
        assert!(matches!(
            validate_buckets(&[f64::NAN]),
            Err(ValidationError::NonFiniteBucket(b)) if b.is_nan()
        ));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ValidationError::NonIncreasingBuckets(1.0, 0.5).to_string(),
            "histogram buckets must be in increasing order: 1 >= 0.5"
        );
        assert_eq!(
            ValidationError::LabelCardinality { name: "jobs".to_string(), expected: 2, found: 1 }
                .to_string(),
            "metric `jobs` defines 2 label names but 1 label values were given"
        );
    }
}
