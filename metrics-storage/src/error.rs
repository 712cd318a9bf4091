use std::error::Error as StdError;

use thiserror::Error;

use crate::codec::CodecError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// A failure reported by a [`KeyValueBackend`][crate::KeyValueBackend].
///
/// Backend clients wrap whatever their transport or command layer returns, so the source is kept
/// opaque.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl BackendError {
    /// Creates a `BackendError` from a message alone.
    pub fn msg<M: Into<String>>(message: M) -> Self {
        BackendError { message: message.into(), source: None }
    }

    /// Creates a `BackendError` wrapping an underlying client error.
    pub fn with_source<M, E>(message: M, source: E) -> Self
    where
        M: Into<String>,
        E: Into<BoxError>,
    {
        BackendError { message: message.into(), source: Some(source.into()) }
    }
}

/// Errors that could occur while updating or collecting metrics from storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing key-value store failed to execute a command.
    #[error("key-value backend operation failed: {0}")]
    Backend(#[from] BackendError),

    /// A series key stored in the backend could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Metric metadata could not be serialized.
    #[error("failed to serialize metadata for metric `{name}`")]
    SerializeMetadata {
        /// Metric name.
        name: String,
        /// Underlying serialization failure.
        #[source]
        source: serde_json::Error,
    },

    /// Metric metadata read back from the backend could not be decoded.
    #[error("failed to decode metadata for metric `{name}`")]
    DecodeMetadata {
        /// Metric name.
        name: String,
        /// Underlying deserialization failure.
        #[source]
        source: serde_json::Error,
    },

    /// A histogram bucket was reported for a boundary that the histogram was not registered with.
    #[error("unable to find bucket for provided value `{bound}` in histogram `{name}`")]
    UnknownBucket {
        /// Histogram name.
        name: String,
        /// The offending boundary, as it was found.
        bound: String,
    },

    /// A histogram series field carried no bucket, count, or sum marker.
    #[error("histogram series `{key}` is missing its bucket marker")]
    MissingBucketMarker {
        /// The raw series key.
        key: String,
    },

    /// A histogram was registered without any bucket boundaries.
    #[error("histogram `{name}` has no buckets")]
    EmptyBuckets {
        /// Histogram name.
        name: String,
    },

    /// A stored value could not be interpreted as a number of the expected shape.
    #[error("invalid value `{value}` stored for series `{key}`")]
    InvalidValue {
        /// The raw series key.
        key: String,
        /// The raw stored value.
        value: String,
    },

    /// An increment or observation was NaN or infinite.
    #[error("metric `{name}` cannot record non-finite value {value}")]
    NonFiniteValue {
        /// Metric name.
        name: String,
        /// The rejected value.
        value: f64,
    },

    /// A label tuple did not line up with the label-name schema of its metric.
    #[error("metric `{name}` defines {expected} label names but {found} label values were found")]
    LabelMismatch {
        /// Metric name.
        name: String,
        /// Length of the label-name schema.
        expected: usize,
        /// Length of the label tuple.
        found: usize,
    },
}
