//! Prometheus collectors, registries, and text exposition over pluggable metrics storage.
//!
//! Metrics are defined through a [`Registry`], which validates names and hands out [`Counter`],
//! [`Gauge`], and [`Histogram`] collectors.  Collectors forward every update to a
//! [`Storage`][metrics_storage::Storage], either in-process or shared between processes, and the
//! collected families can be rendered with [`TextRenderer`].
//!
//! ```rust
//! use metrics_prometheus::{CollectorRegistry, NamespacedRegistry, Registry, TextRenderer};
//! use metrics_storage::InMemoryStorage;
//!
//! let registry = NamespacedRegistry::new("app", CollectorRegistry::new(InMemoryStorage::new()));
//!
//! let requests = registry.counter("requests_total", "Requests served.", &["method"])?;
//! requests.inc_by_one(&["GET"])?;
//!
//! let output = TextRenderer::new().render(&registry.collect_metrics()?);
//! assert!(output.contains("app_requests_total{method=\"GET\"} 1\n"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod collector;
pub use self::collector::{Counter, Gauge, Histogram, DEFAULT_BUCKETS};

mod common;
pub use self::common::{Error, ValidationError};

pub mod formatting;

mod namespaced;
pub use self::namespaced::NamespacedRegistry;

mod registry;
pub use self::registry::{CollectorRegistry, Registry};

mod render;
pub use self::render::{TextRenderer, MIME_TYPE};
