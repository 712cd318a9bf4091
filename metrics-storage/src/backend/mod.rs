//! Primitive commands required from a shared key-value store.

mod memory;
pub use memory::MemoryHashBackend;

use crate::BackendError;

/// The hash commands [`SharedStorage`][crate::SharedStorage] is built on.
///
/// The semantics follow the Redis commands of the same purpose (`DEL`, `HGETALL`, `HSET`,
/// `HSETNX`, `HINCRBYFLOAT`, `HDEL`).  Every command must be atomic on its own; nothing is ever
/// expected to run as part of a transaction.
///
/// Retries, timeouts, and connection management are the client's concern.  Any failure should be
/// reported as a [`BackendError`], which callers surface as a storage error.
pub trait KeyValueBackend: Send + Sync {
    /// Deletes the given top-level keys.  Missing keys are ignored.
    fn del(&self, keys: &[String]) -> Result<(), BackendError>;

    /// Gets every field/value pair of the hash at `key`.
    ///
    /// A missing hash is reported as an empty list, never as an error.
    fn hash_get_all(&self, key: &str) -> Result<Vec<(String, String)>, BackendError>;

    /// Sets `field` of the hash at `key` to `value`, overwriting any previous value.
    fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), BackendError>;

    /// Sets `field` of the hash at `key` to `value` only if the field does not exist yet.
    ///
    /// Returns `true` if the value was written.
    fn hash_set_if_absent(&self, key: &str, field: &str, value: &str) -> Result<bool, BackendError>;

    /// Atomically adds `delta` to the floating-point value of `field` of the hash at `key`.
    ///
    /// A missing field is treated as zero.  Returns the new value.
    fn hash_increment_by_float(&self, key: &str, field: &str, delta: f64)
        -> Result<f64, BackendError>;

    /// Deletes the given fields from the hash at `key`.  Missing fields are ignored.
    fn hash_delete(&self, key: &str, fields: &[String]) -> Result<(), BackendError>;
}
