//! Encoding of a series identity into a single hash field.
//!
//! A series is identified by its metric name and its ordered label values.  Shared storage keeps
//! every series of every metric in one hash, so both parts have to be folded into a single field
//! name, and recovered from it again when collecting.
//!
//! The encoded form is the bare metric name when there are no label values, and otherwise the
//! metric name, a `.` delimiter, and the label values as a JSON array of strings:
//!
//! ```text
//! http_requests_total
//! http_requests_total.["GET","200"]
//! ```
//!
//! A `.` can never appear in a valid metric name, so the first delimiter always marks the end of
//! the name, no matter what the label values contain.
use thiserror::Error;

/// Separates the metric name from the encoded label values.
pub const LABEL_VALUES_DELIMITER: char = '.';

/// Errors that could occur while encoding or decoding a series key.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The metric name contains the delimiter and could not be decoded unambiguously.
    #[error("metric name `{0}` contains the reserved delimiter `.`")]
    InvalidName(String),

    /// The label values could not be serialized.
    #[error("failed to encode label values for metric `{name}`")]
    Encode {
        /// Metric name.
        name: String,
        /// Underlying serialization failure.
        #[source]
        source: serde_json::Error,
    },

    /// The part after the delimiter is not a JSON array of strings.
    #[error("malformed series key `{key}`")]
    Decode {
        /// The raw series key.
        key: String,
        /// Underlying deserialization failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Encodes a metric name and its label values into a series key.
pub fn encode<S: AsRef<str>>(name: &str, label_values: &[S]) -> Result<String, CodecError> {
    if name.contains(LABEL_VALUES_DELIMITER) {
        return Err(CodecError::InvalidName(name.to_string()));
    }

    if label_values.is_empty() {
        return Ok(name.to_string());
    }

    let values = label_values.iter().map(AsRef::as_ref).collect::<Vec<&str>>();
    let encoded = serde_json::to_string(&values)
        .map_err(|source| CodecError::Encode { name: name.to_string(), source })?;

    let mut key = String::with_capacity(name.len() + 1 + encoded.len());
    key.push_str(name);
    key.push(LABEL_VALUES_DELIMITER);
    key.push_str(&encoded);
    Ok(key)
}

/// Decodes a series key back into its metric name and label values.
pub fn decode(key: &str) -> Result<(String, Vec<String>), CodecError> {
    match key.split_once(LABEL_VALUES_DELIMITER) {
        None => Ok((key.to_string(), Vec::new())),
        Some((name, encoded)) => {
            let values = serde_json::from_str::<Vec<String>>(encoded)
                .map_err(|source| CodecError::Decode { key: key.to_string(), source })?;
            Ok((name.to_string(), values))
        }
    }
}
