//! Fallback behavior of the resilient store under injected backend faults

use std::sync::Arc;

use finguard_store::dst::{FaultConfig, FaultType, SimBackend, SimConfig, SimOperation};
use finguard_store::{
    default_settings, BackendErrorKind, BackendHealth, DocumentPath, Fields, Query,
    ResilientStore, ServedFrom, SortDirection, StoreConfig, StoreMode, TransitionCause,
};
use serde_json::{json, Value};

fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Store over a simulated backend that fails every call with `fault`.
fn failing_store(fault: FaultType) -> (ResilientStore, Arc<SimBackend>) {
    let sim = Arc::new(
        SimBackend::new(SimConfig::from_env_or_random())
            .with_fault(FaultConfig::new(fault, 1.0).on_add().on_query().on_get().on_set()),
    );
    let store = ResilientStore::with_backend(sim.clone(), BackendHealth::new());
    (store, sim)
}

#[tokio::test]
async fn test_added_document_is_queryable() {
    init_logging();
    let store = ResilientStore::memory_only(BackendHealth::new());

    let body = fields(json!({
        "name": "Asha Rao",
        "customerId": "CUST-1042",
        "reason": "Missed two payments",
        "priority": "High",
        "nested": {"score": 91}
    }));
    let added = store.collection_add("flagged_customers", body.clone()).await;

    let listed = store
        .collection_query(&Query::collection("flagged_customers"))
        .await
        .into_value();
    let found = listed
        .iter()
        .find(|doc| doc.id == added.value.id)
        .expect("added document should be listed");
    assert_eq!(found.fields, body);
}

#[tokio::test]
async fn test_unwritten_settings_are_defaults() {
    let store = ResilientStore::memory_only(BackendHealth::new());

    let got = store.document_get(&DocumentPath::settings()).await.into_value();
    let expected = json!({
        "thresholds": {"riskScore": 75, "utilization": 80, "delinquency": 1},
        "notifications": {"email": true, "slack": false, "sms": false},
        "autoEscalate": true
    });
    assert_eq!(got.map(|doc| Value::Object(doc.fields)), Some(expected.clone()));

    let settings = store.read_settings().await.into_value();
    assert_eq!(Value::Object(settings), expected);
}

#[tokio::test]
async fn test_missing_credentials_still_serve_every_operation() {
    init_logging();
    // Firestore selected, no credentials present.
    let config = StoreConfig::from_lookup(|_| None);
    let store = ResilientStore::from_config(config, BackendHealth::new());

    let added = store.collection_add("interventions", fields(json!({"status": "APPROVED"}))).await;
    assert_eq!(added.source, ServedFrom::Memory);
    assert!(!store.is_backend_connected());

    let listed = store.collection_query(&Query::collection("interventions")).await;
    assert_eq!(listed.value.len(), 1);

    let path = DocumentPath::new("interventions", &added.value.id).unwrap();
    assert!(store.document_get(&path).await.value.is_some());

    let set = store.document_set(&DocumentPath::settings(), fields(json!({"x": 1})), true).await;
    assert_eq!(set.source, ServedFrom::Memory);

    assert!(!store.is_backend_connected());
    assert_eq!(store.health().mode(), StoreMode::Fallback);
}

#[tokio::test]
async fn test_garbage_settings_start_in_fallback() {
    init_logging();
    for (var, value) in [
        ("FINGUARD_STORE_BACKEND", "firestor"),
        ("FINGUARD_BACKEND_TIMEOUT_SECS", "ten"),
    ] {
        let config = StoreConfig::from_lookup(|name| (name == var).then(|| value.to_string()));
        let store = ResilientStore::from_config(config, BackendHealth::new());

        assert_eq!(store.initialize().await, StoreMode::Fallback);
        assert!(matches!(
            store.health().snapshot().cause,
            Some(TransitionCause::InvalidConfiguration { .. })
        ));

        let added = store.collection_add("interventions", fields(json!({"a": 1}))).await;
        assert_eq!(added.source, ServedFrom::Memory);
    }
}

#[tokio::test]
async fn test_merge_set_unions_disjoint_fields() {
    let store = ResilientStore::memory_only(BackendHealth::new());
    let path = DocumentPath::parse("customers/CUST-7/notes/latest").unwrap();

    store.document_set(&path, fields(json!({"a": 1, "shared": {"x": true}})), true).await;
    store.document_set(&path, fields(json!({"b": 2, "shared": {"y": false}})), true).await;

    let doc = store.document_get(&path).await.into_value().unwrap();
    assert_eq!(
        Value::Object(doc.fields),
        json!({"a": 1, "b": 2, "shared": {"x": true, "y": false}})
    );
}

#[tokio::test]
async fn test_replace_set_overwrites() {
    let store = ResilientStore::memory_only(BackendHealth::new());
    let path = DocumentPath::settings();

    store.document_set(&path, fields(json!({"autoEscalate": false})), false).await;
    let doc = store.document_get(&path).await.into_value().unwrap();
    assert_eq!(Value::Object(doc.fields), json!({"autoEscalate": false}));

    // Defaults fill the gaps on the settings read path.
    let settings = store.read_settings().await.into_value();
    assert_eq!(settings["autoEscalate"], false);
    assert_eq!(settings["notifications"], default_settings()["notifications"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_lose_nothing() {
    let store = Arc::new(ResilientStore::memory_only(BackendHealth::new()));

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .collection_add("flagged_customers", fields(json!({"n": i})))
                    .await
                    .into_value()
                    .id
            })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 32, "identifiers must be distinct");

    let listed = store
        .collection_query(&Query::collection("flagged_customers"))
        .await
        .into_value();
    assert_eq!(listed.len(), 32);
    for id in &ids {
        assert!(listed.iter().any(|doc| &doc.id == id));
    }
}

#[tokio::test]
async fn test_memory_query_sorts_and_limits() {
    let store = ResilientStore::memory_only(BackendHealth::new());
    for (name, at) in [
        ("b", json!("2025-01-02T00:00:00.000Z")),
        ("none", Value::Null),
        ("c", json!("2025-01-03T00:00:00.000Z")),
        ("a", json!("2025-01-01T00:00:00.000Z")),
    ] {
        store
            .collection_add("interventions", fields(json!({"name": name, "approvedAt": at})))
            .await;
    }

    let names = |docs: Vec<finguard_store::Document>| {
        docs.iter()
            .map(|d| d.get_str("name").unwrap_or_default().to_string())
            .collect::<Vec<_>>()
    };

    let desc = store
        .collection_query(
            &Query::collection("interventions")
                .order_by("approvedAt", SortDirection::Descending)
                .limit(3),
        )
        .await
        .into_value();
    assert_eq!(names(desc), vec!["c", "b", "a"]);

    let asc = store
        .collection_query(&Query::collection("interventions").order_by("approvedAt", SortDirection::Ascending))
        .await
        .into_value();
    assert_eq!(names(asc), vec!["none", "a", "b", "c"]);
}

#[tokio::test]
async fn test_absent_collection_queries_empty() {
    let store = ResilientStore::memory_only(BackendHealth::new());
    let listed = store.collection_query(&Query::collection("never_written")).await;
    assert!(listed.value.is_empty());
}

#[tokio::test]
async fn test_service_disabled_degrades_for_good() {
    init_logging();
    let (store, sim) = failing_store(FaultType::ServiceDisabled);

    let added = store.collection_add("flagged_customers", fields(json!({"name": "Ravi"}))).await;
    assert_eq!(added.source, ServedFrom::Memory);
    let transition = added.transition.expect("first failure should degrade");
    assert_eq!(transition.to, StoreMode::Fallback);
    assert!(!store.is_backend_connected());

    let attempts = sim.data_calls();
    for _ in 0..5 {
        store.collection_query(&Query::collection("flagged_customers")).await;
        store.document_get(&DocumentPath::settings()).await;
    }
    assert_eq!(sim.data_calls(), attempts, "degraded store must not call the backend");
}

#[tokio::test]
async fn test_read_outage_is_surfaced_without_degrading() {
    init_logging();
    let sim = Arc::new(
        SimBackend::new(SimConfig::from_env_or_random())
            .with_fault(FaultConfig::new(FaultType::Unavailable, 1.0).on_query()),
    );
    let store = ResilientStore::with_backend(sim.clone(), BackendHealth::new());

    for _ in 0..3 {
        let served = store.collection_query(&Query::collection("interventions")).await;
        assert_eq!(served.source, ServedFrom::Memory);
        assert!(served.transition.is_none());
        assert_eq!(served.fault.map(|f| f.kind), Some(BackendErrorKind::Unavailable));
    }

    // Each read retried the real backend; the store never degraded.
    assert_eq!(sim.calls(SimOperation::Query), 3);
    assert!(store.is_backend_connected());
}

#[tokio::test]
async fn test_write_outage_keeps_writes_readable() {
    init_logging();
    let (store, sim) = failing_store(FaultType::Unavailable);

    let added = store
        .collection_add("interventions", fields(json!({"status": "ESCALATED"})))
        .await;
    assert_eq!(added.source, ServedFrom::Memory);
    assert_eq!(added.fault.map(|f| f.kind), Some(BackendErrorKind::Unavailable));
    let transition = added.transition.expect("failed write should degrade");
    assert_eq!(transition.to, StoreMode::Fallback);
    assert!(!store.is_backend_connected());

    let listed = store
        .collection_query(&Query::collection("interventions"))
        .await
        .into_value();
    assert!(
        listed.iter().any(|doc| doc.id == added.value.id),
        "added document must be listed after a failed backend write"
    );

    let path = DocumentPath::settings();
    let set = store
        .document_set(&path, fields(json!({"autoEscalate": false})), true)
        .await;
    assert_eq!(set.source, ServedFrom::Memory);
    let settings = store.read_settings().await.into_value();
    assert_eq!(settings["autoEscalate"], json!(false));

    // Only the first write reached the backend.
    assert_eq!(sim.data_calls(), 1);
}

#[tokio::test]
async fn test_probe_failure_after_optimistic_write() {
    let sim = Arc::new(
        SimBackend::new(SimConfig::with_seed(11))
            .with_fault(FaultConfig::new(FaultType::NotFound, 1.0).on_probe()),
    );
    let health = BackendHealth::new();
    let mut modes = health.subscribe();
    let store = ResilientStore::with_backend(sim.clone(), health);

    // Served by the real backend before the probe resolves, or from memory
    // after; either way it succeeds.
    let first = store.collection_add("interventions", Fields::new()).await;
    assert!(first.fault.is_none());

    let state = modes
        .wait_for(|state| state.mode == StoreMode::Fallback)
        .await
        .unwrap()
        .clone();
    assert!(state.cause.is_some());
    assert!(!store.is_backend_connected());

    let later = store.collection_add("interventions", Fields::new()).await;
    assert_eq!(later.source, ServedFrom::Memory);
}

#[tokio::test]
async fn test_shared_health_degrades_together() {
    let health = BackendHealth::new();
    let failing_sim = Arc::new(
        SimBackend::new(SimConfig::with_seed(5))
            .with_fault(FaultConfig::new(FaultType::NotFound, 1.0).on_get()),
    );
    let failing = ResilientStore::with_backend(failing_sim, health.clone());
    let healthy = ResilientStore::with_backend(
        Arc::new(SimBackend::new(SimConfig::with_seed(6))),
        health.clone(),
    );

    healthy.initialize().await;
    failing.document_get(&DocumentPath::settings()).await;

    assert_eq!(health.mode(), StoreMode::Fallback);
    let served = healthy.collection_add("interventions", Fields::new()).await;
    assert_eq!(served.source, ServedFrom::Memory);
}
