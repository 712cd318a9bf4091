use approx::assert_relative_eq;
use metrics_storage::{
    codec, BackendError, KeyValueBackend, Label, MemoryHashBackend, MetricKind, SharedStorage,
    SharedStorageBuilder, Storage, StorageError,
};
use mockall::mock;
use proptest::prelude::*;

mock! {
    pub Backend {}

    impl KeyValueBackend for Backend {
        fn del(&self, keys: &[String]) -> Result<(), BackendError>;
        fn hash_get_all(&self, key: &str) -> Result<Vec<(String, String)>, BackendError>;
        fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), BackendError>;
        fn hash_set_if_absent(&self, key: &str, field: &str, value: &str) -> Result<bool, BackendError>;
        fn hash_increment_by_float(&self, key: &str, field: &str, delta: f64) -> Result<f64, BackendError>;
        fn hash_delete(&self, key: &str, fields: &[String]) -> Result<(), BackendError>;
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

#[test]
fn test_counters_and_gauges() {
    init_tracing();
    let storage = SharedStorage::new(MemoryHashBackend::new());
    let names = strings(&["method"]);
    let get = strings(&["GET"]);
    let post = strings(&["POST"]);

    storage.update_counter("requests", 5.0, "Requests.", &names, &get).unwrap();
    storage.update_counter("requests", -2.0, "Requests.", &names, &get).unwrap();
    storage.update_counter("requests", 1.0, "Requests.", &names, &post).unwrap();
    storage.update_gauge("temperature", 10.0, false, "", &[], &[]).unwrap();
    storage.update_gauge("temperature", 3.0, false, "", &[], &[]).unwrap();
    storage.update_gauge("temperature", 4.0, true, "", &[], &[]).unwrap();

    let families = storage.collect().unwrap();
    assert_eq!(families.len(), 2);

    assert_eq!(families[0].name(), "requests");
    assert_eq!(families[0].kind(), MetricKind::Counter);
    assert_eq!(families[0].help(), "Requests.");
    let samples = families[0].samples();
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].value(), 3.0);
    assert_eq!(samples[0].labels(), &[Label::new("method", "GET")]);
    assert_eq!(samples[1].value(), 1.0);
    assert_eq!(samples[1].labels(), &[Label::new("method", "POST")]);

    assert_eq!(families[1].name(), "temperature");
    assert_eq!(families[1].kind(), MetricKind::Gauge);
    assert_eq!(families[1].samples()[0].value(), 7.0);
}

#[test]
fn test_histogram_buckets_are_rebuilt() {
    let storage = SharedStorage::new(MemoryHashBackend::new());
    let buckets = [0.1, 0.5, 1.0];

    for value in [0.05, 0.3, 0.3, 2.0] {
        storage.update_histogram("latency", value, &buckets, "Latency.", &[], &[]).unwrap();
    }

    let families = storage.collect().unwrap();
    assert_eq!(families.len(), 1);
    assert_eq!(families[0].kind(), MetricKind::Histogram);
    assert_eq!(families[0].help(), "Latency.");

    let samples = families[0].samples();
    assert_eq!(samples.len(), 6);

    let expected = [("0.1", 1.0), ("0.5", 3.0), ("1", 3.0), ("+Inf", 4.0)];
    for (sample, (le, value)) in samples.iter().zip(expected.iter()) {
        assert_eq!(sample.name(), "latency_bucket");
        assert_eq!(sample.labels(), &[Label::new("le", *le)]);
        assert_eq!(sample.value(), *value);
    }

    assert_eq!(samples[4].name(), "latency_count");
    assert_eq!(samples[4].value(), 4.0);
    assert_eq!(samples[5].name(), "latency_sum");
    assert_relative_eq!(samples[5].value(), 2.65);
}

#[test]
fn test_histogram_only_touches_one_bucket() {
    let backend = MemoryHashBackend::new();
    let storage = SharedStorage::new(backend.clone());

    storage.update_histogram("latency", 0.3, &[0.1, 0.5, 1.0], "", &[], &[]).unwrap();

    let fields = backend
        .hash_get_all(storage.metrics_key())
        .unwrap()
        .into_iter()
        .map(|(field, _)| field)
        .collect::<Vec<_>>();
    assert_eq!(
        fields,
        vec![
            codec::encode("latency", &["0.5"]).unwrap(),
            codec::encode("latency", &["count"]).unwrap(),
            codec::encode("latency", &["sum"]).unwrap(),
        ]
    );
}

#[test]
fn test_metadata_first_write_wins() {
    let backend = MemoryHashBackend::new();
    let first = SharedStorage::new(backend.clone());
    let second = SharedStorage::new(backend);

    first.update_counter("jobs", 1.0, "first", &[], &[]).unwrap();
    second.update_counter("jobs", 1.0, "second", &[], &[]).unwrap();

    let families = second.collect().unwrap();
    assert_eq!(families[0].help(), "first");
    assert_eq!(families[0].samples()[0].value(), 2.0);
}

#[test]
fn test_stale_series_are_removed() {
    let backend = MemoryHashBackend::new();
    let storage = SharedStorage::new(backend.clone());

    storage.update_counter("requests", 1.0, "", &[], &[]).unwrap();
    storage.update_gauge("temperature", 1.0, false, "", &[], &[]).unwrap();
    backend.hash_delete(storage.meta_key(), &strings(&["requests"])).unwrap();

    let families = storage.collect().unwrap();
    assert_eq!(families.len(), 1);
    assert_eq!(families[0].name(), "temperature");

    let fields = backend.hash_get_all(storage.metrics_key()).unwrap();
    assert_eq!(fields, vec![("temperature".to_string(), "1".to_string())]);
}

#[test]
fn test_wipe_storage() {
    let backend = MemoryHashBackend::new();
    let storage = SharedStorage::new(backend.clone());

    storage.update_counter("requests", 1.0, "old", &[], &[]).unwrap();
    storage.update_histogram("latency", 0.2, &[1.0], "", &[], &[]).unwrap();
    storage.wipe_storage().unwrap();

    assert!(storage.collect().unwrap().is_empty());
    assert!(backend.hash_get_all(storage.metrics_key()).unwrap().is_empty());
    assert!(backend.hash_get_all(storage.meta_key()).unwrap().is_empty());

    storage.update_counter("requests", 1.0, "new", &[], &[]).unwrap();
    assert_eq!(storage.collect().unwrap()[0].help(), "new");
}

#[test]
fn test_prefixes_are_isolated() {
    let backend = MemoryHashBackend::new();
    let default = SharedStorage::new(backend.clone());
    let custom = SharedStorageBuilder::new().with_prefix("app_").build(backend);

    assert_eq!(default.metrics_key(), "prometheus_metrics");
    assert_eq!(default.meta_key(), "prometheus_meta");
    assert_eq!(custom.metrics_key(), "app_metrics");
    assert_eq!(custom.meta_key(), "app_meta");

    custom.update_counter("requests", 1.0, "", &[], &[]).unwrap();
    assert!(default.collect().unwrap().is_empty());
    assert_eq!(custom.collect().unwrap().len(), 1);
}

#[test]
fn test_debug_shows_keys() {
    let storage = SharedStorageBuilder::new().with_prefix("app_").build(MemoryHashBackend::new());

    let debug = format!("{:?}", storage);
    assert!(debug.contains("metrics_key: \"app_metrics\""), "{}", debug);
    assert!(debug.contains("meta_key: \"app_meta\""), "{}", debug);
}

#[test]
fn test_unknown_bucket_from_other_writer() {
    let backend = MemoryHashBackend::new();
    let first = SharedStorage::new(backend.clone());
    let second = SharedStorage::new(backend);

    first.update_histogram("latency", 0.5, &[1.0, 2.0], "", &[], &[]).unwrap();
    second.update_histogram("latency", 3.0, &[5.0], "", &[], &[]).unwrap();

    match first.collect() {
        Err(StorageError::UnknownBucket { name, bound }) => {
            assert_eq!(name, "latency");
            assert_eq!(bound, "5");
        }
        other => panic!("expected an unknown bucket error, got {:?}", other),
    }
}

#[test]
fn test_label_arity_from_other_writer() {
    let backend = MemoryHashBackend::new();
    let first = SharedStorage::new(backend.clone());
    let second = SharedStorage::new(backend);

    let names = strings(&["queue", "host"]);
    let values = strings(&["a", "h"]);

    first.update_counter("jobs", 1.0, "", &names[..1], &values[..1]).unwrap();
    second.update_counter("jobs", 1.0, "", &names, &values).unwrap();

    match first.collect() {
        Err(StorageError::LabelMismatch { name, expected, found }) => {
            assert_eq!(name, "jobs");
            assert_eq!(expected, 1);
            assert_eq!(found, 2);
        }
        other => panic!("expected a label mismatch, got {:?}", other),
    }
}

#[test]
fn test_histogram_label_arity_from_other_writer() {
    let backend = MemoryHashBackend::new();
    let first = SharedStorage::new(backend.clone());
    let second = SharedStorage::new(backend);

    let names = strings(&["route"]);
    let values = strings(&["/"]);

    first.update_histogram("latency", 0.5, &[1.0], "", &names, &values).unwrap();
    second.update_histogram("latency", 0.5, &[1.0], "", &[], &[]).unwrap();

    match first.collect() {
        Err(StorageError::LabelMismatch { name, expected, found }) => {
            assert_eq!(name, "latency");
            assert_eq!(expected, 1);
            assert_eq!(found, 0);
        }
        other => panic!("expected a label mismatch, got {:?}", other),
    }
}

#[test]
fn test_histogram_series_without_marker() {
    let backend = MemoryHashBackend::new();
    let storage = SharedStorage::new(backend.clone());

    storage.update_histogram("latency", 0.5, &[1.0], "", &[], &[]).unwrap();
    backend.hash_set(storage.metrics_key(), "latency", "1").unwrap();

    match storage.collect() {
        Err(StorageError::MissingBucketMarker { key }) => assert_eq!(key, "latency"),
        other => panic!("expected a missing marker error, got {:?}", other),
    }
}

#[test]
fn test_non_finite_observation_touches_nothing() {
    let backend = MemoryHashBackend::new();
    let storage = SharedStorage::new(backend.clone());

    storage.update_histogram("latency", 0.5, &[1.0], "", &[], &[]).unwrap();
    let before = backend.hash_get_all(storage.metrics_key()).unwrap();

    for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let result = storage.update_histogram("latency", value, &[1.0], "", &[], &[]);
        assert!(matches!(
            result,
            Err(StorageError::NonFiniteValue { name, .. }) if name == "latency"
        ));
        let result = storage.update_counter("requests", value, "", &[], &[]);
        assert!(matches!(result, Err(StorageError::NonFiniteValue { .. })));
    }

    assert_eq!(backend.hash_get_all(storage.metrics_key()).unwrap(), before);
    let metas = backend.hash_get_all(storage.meta_key()).unwrap();
    assert_eq!(metas.len(), 1);
    assert_eq!(metas[0].0, "latency");
}

#[test]
fn test_malformed_series_key() {
    let backend = MemoryHashBackend::new();
    let storage = SharedStorage::new(backend.clone());

    storage.update_counter("requests", 1.0, "", &[], &[]).unwrap();
    backend.hash_set(storage.metrics_key(), "requests.[", "1").unwrap();

    assert!(matches!(storage.collect(), Err(StorageError::Codec(_))));
}

#[test]
fn test_corrupted_value() {
    let backend = MemoryHashBackend::new();
    let storage = SharedStorage::new(backend.clone());

    storage.update_histogram("latency", 0.5, &[1.0], "", &[], &[]).unwrap();
    let count = codec::encode("latency", &["count"]).unwrap();
    backend.hash_set(storage.metrics_key(), &count, "1.5").unwrap();

    let result = storage.collect();
    assert!(matches!(result, Err(StorageError::InvalidValue { key, .. }) if key == count));
}

#[test]
fn test_backend_failures_are_propagated() {
    let mut backend = MockBackend::new();
    backend
        .expect_hash_set_if_absent()
        .returning(|_, _, _| Err(BackendError::msg("connection refused")));
    backend.expect_hash_increment_by_float().never();

    let storage = SharedStorage::new(backend);
    let result = storage.update_counter("requests", 1.0, "", &[], &[]);

    match result {
        Err(StorageError::Backend(e)) => assert_eq!(e.to_string(), "connection refused"),
        other => panic!("expected a backend error, got {:?}", other),
    }
}

#[test]
fn test_failed_stale_cleanup_keeps_snapshot() {
    init_tracing();
    let mut backend = MockBackend::new();
    backend
        .expect_hash_get_all()
        .withf(|key| key == "prometheus_meta")
        .returning(|_| Ok(vec![]));
    backend
        .expect_hash_get_all()
        .withf(|key| key == "prometheus_metrics")
        .returning(|_| Ok(vec![("requests".to_string(), "1".to_string())]));
    backend
        .expect_hash_delete()
        .withf(|key, fields| key == "prometheus_metrics" && fields == ["requests".to_string()])
        .times(1)
        .returning(|_, _| Err(BackendError::msg("read-only replica")));

    let storage = SharedStorage::new(backend);
    assert!(storage.collect().unwrap().is_empty());
}

#[test]
fn test_wipe_deletes_both_hashes() {
    let mut backend = MockBackend::new();
    backend
        .expect_del()
        .withf(|keys| keys == ["app_meta".to_string(), "app_metrics".to_string()])
        .times(1)
        .returning(|_| Ok(()));

    let storage = SharedStorageBuilder::new().with_prefix("app_").build(backend);
    storage.wipe_storage().unwrap();
}

proptest! {
    #[test]
    fn test_interleaved_writers_converge(
        deltas in proptest::collection::vec((any::<bool>(), -1000i32..1000), 0..64)
    ) {
        let backend = MemoryHashBackend::new();
        let writers = [SharedStorage::new(backend.clone()), SharedStorage::new(backend)];
        let names = strings(&["shard"]);
        let values = strings(&["0"]);

        let mut expected = 0.0;
        for (writer, delta) in &deltas {
            let delta = f64::from(*delta);
            let storage = &writers[usize::from(*writer)];
            storage.update_counter("total", delta, "", &names, &values).unwrap();
            expected += delta;
        }

        let families = writers[0].collect().unwrap();
        if deltas.is_empty() {
            prop_assert!(families.is_empty());
        } else {
            prop_assert_eq!(families.len(), 1);
            prop_assert_eq!(families[0].samples()[0].value(), expected);
        }
    }
}
