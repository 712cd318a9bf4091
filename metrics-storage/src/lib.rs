//! Storage and aggregation of Prometheus-style metrics.
//!
//! This crate turns a stream of point updates (increment a counter, set a gauge, observe a
//! histogram value) into snapshots of metric families ready to be rendered in the Prometheus
//! text exposition format.
//!
//! Two [`Storage`] implementations are provided:
//! - [`InMemoryStorage`], which keeps everything in the memory of the current process, and
//! - [`SharedStorage`], which keeps everything in a key-value store that any number of independent
//!   processes can update concurrently, as long as the store offers the atomic hash commands
//!   described by [`KeyValueBackend`].
//!
//! ```rust
//! use metrics_storage::{InMemoryStorage, Storage};
//!
//! let storage = InMemoryStorage::new();
//! let names = vec!["method".to_string()];
//! let values = vec!["GET".to_string()];
//!
//! storage.update_counter("http_requests_total", 1.0, "Requests served.", &names, &values)?;
//! storage.update_histogram("http_latency_seconds", 0.2, &[0.1, 0.5], "", &names, &values)?;
//!
//! let families = storage.collect()?;
//! assert_eq!(families.len(), 2);
//! # Ok::<(), metrics_storage::StorageError>(())
//! ```
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod backend;
pub use self::backend::{KeyValueBackend, MemoryHashBackend};

pub mod codec;
pub use self::codec::CodecError;

mod error;
pub use self::error::{BackendError, StorageError};

pub mod histogram;
pub use self::histogram::{Histogram, HistogramSamplesBuilder};

mod kind;
pub use self::kind::MetricKind;

mod sample;
pub use self::sample::{Label, MetricFamilySamples, Sample};

mod storage;
pub use self::storage::{
    InMemoryStorage, SharedStorage, SharedStorageBuilder, Storage, DEFAULT_KEY_PREFIX,
};
