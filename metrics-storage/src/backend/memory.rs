use std::{collections::HashMap, sync::Arc};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::{BackendError, KeyValueBackend};

type Hashes = HashMap<String, IndexMap<String, String>>;

/// An in-process implementation of the hash commands.
///
/// Cloning a `MemoryHashBackend` yields another handle to the same data, which makes it possible
/// to point several [`SharedStorage`][crate::SharedStorage] instances at one store, the same way
/// several processes would share one Redis server.  Every command runs under a single lock and is
/// therefore atomic.
///
/// Fields are returned by [`hash_get_all`][KeyValueBackend::hash_get_all] in the order they were
/// first written.
#[derive(Clone, Debug, Default)]
pub struct MemoryHashBackend {
    hashes: Arc<Mutex<Hashes>>,
}

impl MemoryHashBackend {
    /// Creates a new, empty `MemoryHashBackend`.
    pub fn new() -> MemoryHashBackend {
        MemoryHashBackend::default()
    }
}

impl KeyValueBackend for MemoryHashBackend {
    fn del(&self, keys: &[String]) -> Result<(), BackendError> {
        let mut hashes = self.hashes.lock();
        for key in keys {
            hashes.remove(key);
        }
        Ok(())
    }

    fn hash_get_all(&self, key: &str) -> Result<Vec<(String, String)>, BackendError> {
        let hashes = self.hashes.lock();
        Ok(hashes
            .get(key)
            .map(|hash| hash.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), BackendError> {
        let mut hashes = self.hashes.lock();
        hashes.entry(key.to_string()).or_default().insert(field.to_string(), value.to_string());
        Ok(())
    }

    fn hash_set_if_absent(&self, key: &str, field: &str, value: &str) -> Result<bool, BackendError> {
        let mut hashes = self.hashes.lock();
        let hash = hashes.entry(key.to_string()).or_default();
        if hash.contains_key(field) {
            return Ok(false);
        }

        hash.insert(field.to_string(), value.to_string());
        Ok(true)
    }

    fn hash_increment_by_float(
        &self,
        key: &str,
        field: &str,
        delta: f64,
    ) -> Result<f64, BackendError> {
        let mut hashes = self.hashes.lock();
        let hash = hashes.entry(key.to_string()).or_default();

        let current = match hash.get(field) {
            Some(raw) => raw.parse::<f64>().map_err(|e| {
                BackendError::with_source(format!("hash value of `{}` is not a float", field), e)
            })?,
            None => 0.0,
        };

        let updated = current + delta;
        if !updated.is_finite() {
            return Err(BackendError::msg(format!(
                "increment of `{}` would produce NaN or Infinity",
                field
            )));
        }

        hash.insert(field.to_string(), updated.to_string());
        Ok(updated)
    }

    fn hash_delete(&self, key: &str, fields: &[String]) -> Result<(), BackendError> {
        let mut hashes = self.hashes.lock();
        if let Some(hash) = hashes.get_mut(key) {
            for field in fields {
                hash.shift_remove(field);
            }
            if hash.is_empty() {
                hashes.remove(key);
            }
        }
        Ok(())
    }
}
