use metrics_storage::{MetricFamilySamples, StorageError};

use crate::{Counter, Gauge, Histogram, Registry, ValidationError};

/// Applies a namespace to every metric name.
///
/// Names will be prefixed in the format of `<namespace>_<name>`.  Leading and trailing
/// underscores are trimmed from the namespace, so `"app"`, `"app_"`, and `"_app_"` all produce
/// `app_<name>`.
///
/// Collection and wiping are passed through as-is: they act on every metric of the inner registry,
/// not just the namespaced ones.
#[derive(Debug)]
pub struct NamespacedRegistry<R> {
    namespace: String,
    inner: R,
}

impl<R> NamespacedRegistry<R> {
    /// Creates a new `NamespacedRegistry` wrapping the given registry.
    pub fn new<N: AsRef<str>>(namespace: N, inner: R) -> NamespacedRegistry<R> {
        NamespacedRegistry { namespace: namespace.as_ref().trim_matches('_').to_string(), inner }
    }

    /// Gets the namespace applied to metric names.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Gets a reference to the wrapped registry.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    fn prefix_name(&self, name: &str) -> String {
        let mut new_name = String::with_capacity(self.namespace.len() + 1 + name.len());
        new_name.push_str(&self.namespace);
        new_name.push('_');
        new_name.push_str(name);
        new_name
    }
}

impl<R: Registry> Registry for NamespacedRegistry<R> {
    fn counter(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<Counter, ValidationError> {
        self.inner.counter(&self.prefix_name(name), help, label_names)
    }

    fn gauge(&self, name: &str, help: &str, label_names: &[&str]) -> Result<Gauge, ValidationError> {
        self.inner.gauge(&self.prefix_name(name), help, label_names)
    }

    fn histogram(
        &self,
        name: &str,
        buckets: &[f64],
        help: &str,
        label_names: &[&str],
    ) -> Result<Histogram, ValidationError> {
        self.inner.histogram(&self.prefix_name(name), buckets, help, label_names)
    }

    fn collect_metrics(&self) -> Result<Vec<MetricFamilySamples>, StorageError> {
        self.inner.collect_metrics()
    }

    fn wipe_storage(&self) -> Result<(), StorageError> {
        self.inner.wipe_storage()
    }
}

#[cfg(test)]
mod tests {
    use metrics_storage::{InMemoryStorage, MetricKind};

    use super::NamespacedRegistry;
    use crate::{CollectorRegistry, Registry, ValidationError};

    fn registry(namespace: &str) -> NamespacedRegistry<CollectorRegistry> {
        NamespacedRegistry::new(namespace, CollectorRegistry::new(InMemoryStorage::new()))
    }

    #[test]
    fn test_namespace_is_trimmed() {
        for namespace in &["app", "app_", "_app", "__app__"] {
            assert_eq!(registry(namespace).namespace(), "app");
        }
    }

    #[test]
    fn test_names_are_prefixed() {
        let registry = registry("app_");

        let counter = registry.counter("requests", "Requests.", &["method"]).unwrap();
        assert_eq!(counter.name(), "app_requests");
        assert_eq!(counter.help(), "Requests.");
        assert_eq!(registry.gauge("temperature", "", &[]).unwrap().name(), "app_temperature");

        let histogram = registry.histogram("latency", &[1.0], "", &[]).unwrap();
        assert_eq!(histogram.name(), "app_latency");
        assert_eq!(histogram.buckets(), &[1.0]);

        // The inner registry caches the prefixed name.
        let cached = registry.inner().counter("app_requests", "other", &[]).unwrap();
        assert_eq!(cached.help(), "Requests.");
    }

    #[test]
    fn test_invalid_names_are_still_rejected() {
        let result = registry("app").counter("http.requests", "", &[]);
        assert_eq!(
            result.unwrap_err(),
            ValidationError::InvalidMetricName("app_http.requests".to_string())
        );
    }

    #[test]
    fn test_collection_is_passed_through() {
        let registry = registry("app");

        registry.counter("jobs", "", &[]).unwrap().inc_by_one(&[]).unwrap();
        registry.inner().gauge("other", "", &[]).unwrap().set(1.0, &[]).unwrap();

        let families = registry.collect_metrics().unwrap();
        let names = families.iter().map(|f| (f.name(), f.kind())).collect::<Vec<_>>();
        assert_eq!(names, vec![("app_jobs", MetricKind::Counter), ("other", MetricKind::Gauge)]);

        registry.wipe_storage().unwrap();
        assert!(registry.inner().collect_metrics().unwrap().is_empty());
    }

    #[test]
    fn test_debug() {
        let debug = format!("{:?}", registry("app"));
        let expected = "NamespacedRegistry { namespace: \"app\", inner: CollectorRegistry {";
        assert!(debug.starts_with(expected), "{}", debug);
    }
}
