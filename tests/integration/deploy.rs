//! Deployment runs against the in-memory store.

use serde_json::json;
use solkit_cli::core::{Item, SolkitError, kinds};
use solkit_cli::deploy::{CancelToken, DeployOptions, DeploymentDriver, ItemState, NoopSink};
use solkit_cli::handlers::HandlerRegistry;
use solkit_cli::templating::{templatize, templatize_with};
use solkit_cli::test_utils::{MockStore, RecordingSink, deployed_id, init_test_logging};
use std::time::Duration;

fn frozen(id: &str, kind: &str, deps: &[&str]) -> Item {
    Item::new(id, kind).with_dependencies(deps.iter().map(|d| templatize(d)))
}

/// wma → map → svc, with placeholders in the bodies.
fn app_stack() -> Vec<Item> {
    vec![
        frozen("wma", kinds::WEB_MAPPING_APPLICATION, &["map"])
            .with_url(format!("https://apps.example.com/viewer/index.html?appid={}", templatize("wma")))
            .with_body(json!({"values": {"webmap": templatize("map")}})),
        frozen("map", kinds::WEB_MAP, &["svc"]).with_body(json!({
            "operationalLayers": [{
                "itemId": templatize("svc"),
                "url": format!("{}/0", templatize_with("svc", "url"))
            }]
        })),
        frozen("svc", kinds::FEATURE_SERVICE, &[])
            .with_url("https://services.example.com/Parcels/FeatureServer"),
    ]
}

#[tokio::test]
async fn test_deploys_in_order_and_rewrites_references() {
    init_test_logging(None);
    let store = MockStore::new();
    let registry = HandlerRegistry::with_defaults();
    let sink = RecordingSink::new();

    let report = DeploymentDriver::new(&store, &registry).deploy(&app_stack(), &sink).await.unwrap();

    assert!(report.is_success(), "{}", report.summary());
    assert_eq!(report.order, vec!["svc", "map", "wma"]);
    assert_eq!(store.created_ids(), vec!["svc", "map", "wma"]);
    assert_eq!(report.deployed["map"], deployed_id("map"));

    let map = store.created_item("map").unwrap();
    assert_eq!(map.body["operationalLayers"][0]["itemId"], deployed_id("svc"));
    assert_eq!(
        map.body["operationalLayers"][0]["url"],
        "https://services.example.com/Parcels/FeatureServer/0"
    );
    assert_eq!(store.created_item("wma").unwrap().body["values"]["webmap"], deployed_id("map"));

    // The app's own id is only known after creation and is patched afterwards
    let updates = store.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, deployed_id("wma"));
    assert_eq!(
        updates[0].1["url"],
        format!("https://apps.example.com/viewer/index.html?appid={}", deployed_id("wma"))
    );

    assert_eq!(
        sink.statuses("wma"),
        vec![ItemState::ResolvingBody, ItemState::Creating, ItemState::PostProcessing, ItemState::Done]
    );
    let progress: Vec<f64> = sink.events().iter().map(|e| e.progress).collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last().copied(), Some(1.0));
}

#[tokio::test]
async fn test_dependents_see_resolved_self_referencing_url() {
    let store = MockStore::new();
    let registry = HandlerRegistry::with_defaults();
    let mut items = app_stack();
    items.push(frozen("dash", "Thing", &["wma"]).with_body(json!({"link": templatize_with("wma", "url")})));

    let report = DeploymentDriver::new(&store, &registry).deploy(&items, &NoopSink).await.unwrap();
    assert!(report.is_success(), "{}", report.summary());

    let expected = format!("https://apps.example.com/viewer/index.html?appid={}", deployed_id("wma"));
    assert_eq!(report.remap.value("wma", "url"), Some(expected.as_str()));
    assert_eq!(store.created_item("dash").unwrap().body["link"], expected);
}

#[tokio::test]
async fn test_failed_create_propagates_to_dependents_only() {
    let store = MockStore::new().fail_create("b", "quota exceeded");
    let registry = HandlerRegistry::with_defaults();
    let items = vec![frozen("a", "Thing", &["b"]), frozen("b", "Thing", &[]), frozen("c", "Thing", &[])];

    let report = DeploymentDriver::new(&store, &registry).deploy(&items, &NoopSink).await.unwrap();

    assert_eq!(report.deployed.keys().collect::<Vec<_>>(), vec!["c"]);
    assert!(report.failed["b"].reason.contains("quota exceeded"));
    match report.error("a") {
        Some(SolkitError::DependencyFailed {
            dependency,
            reason,
            ..
        }) => {
            assert_eq!(dependency, "b");
            assert!(reason.contains("quota exceeded"));
        }
        other => panic!("unexpected outcome for a: {other:?}"),
    }
    // a was never attempted
    assert!(!store.calls().contains(&"create a".to_string()));
    assert!(!report.remap.contains("b"));
}

#[tokio::test]
async fn test_unresolved_placeholder_fails_item() {
    let store = MockStore::new();
    let registry = HandlerRegistry::with_defaults();
    let items = vec![
        Item::new("map", "Thing").with_body(json!({"service": templatize_with("ghost", "url")})),
        Item::new("ok", "Thing"),
    ];

    let report = DeploymentDriver::new(&store, &registry).deploy(&items, &NoopSink).await.unwrap();
    assert!(matches!(report.error("map"), Some(SolkitError::UnresolvedReference { .. })));
    assert!(report.deployed.contains_key("ok"));
}

#[tokio::test]
async fn test_external_references_keep_their_ids() {
    let store = MockStore::new();
    let registry = HandlerRegistry::with_defaults();
    let items = vec![
        frozen("map", kinds::WEB_MAP, &["basemap"])
            .with_body(json!({"baseMap": {"baseMapLayers": [{"itemId": templatize("basemap")}]}})),
    ];

    let report = DeploymentDriver::new(&store, &registry).deploy(&items, &NoopSink).await.unwrap();
    assert!(report.is_success());
    let map = store.created_item("map").unwrap();
    assert_eq!(map.body["baseMap"]["baseMapLayers"][0]["itemId"], "basemap");
}

#[tokio::test]
async fn test_cycle_aborts_before_creating_anything() {
    let store = MockStore::new();
    let registry = HandlerRegistry::with_defaults();
    let items = vec![frozen("a", "Thing", &["b"]), frozen("b", "Thing", &["a"])];

    let err = DeploymentDriver::new(&store, &registry).deploy(&items, &NoopSink).await.unwrap_err();
    assert!(matches!(err, SolkitError::CyclicalDependency { .. }));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_parallel_waves_respect_dependencies() {
    let mut store = MockStore::new();
    let mut items = vec![frozen("top", "Thing", &["s1", "s2", "s3", "s4"])];
    for id in ["s1", "s2", "s3", "s4"] {
        store = store.delay_create(id, Duration::from_millis(30));
        items.push(frozen(id, "Thing", &[]));
    }
    let registry = HandlerRegistry::with_defaults();

    let report = DeploymentDriver::new(&store, &registry)
        .with_options(DeployOptions::default().with_max_concurrency(4))
        .deploy(&items, &NoopSink)
        .await
        .unwrap();

    assert!(report.is_success());
    assert!(store.peak_concurrency() > 1);
    assert_eq!(store.created_ids().last().map(String::as_str), Some("top"));
}

#[tokio::test]
async fn test_sequential_by_default() {
    let mut store = MockStore::new();
    let mut items = Vec::new();
    for id in ["a", "b", "c"] {
        store = store.delay_create(id, Duration::from_millis(5));
        items.push(frozen(id, "Thing", &[]));
    }
    let registry = HandlerRegistry::with_defaults();

    DeploymentDriver::new(&store, &registry).deploy(&items, &NoopSink).await.unwrap();
    assert_eq!(store.peak_concurrency(), 1);
    assert_eq!(store.created_ids(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_cancellation_stops_remaining_items() {
    let store = MockStore::new();
    let registry = HandlerRegistry::with_defaults();
    let items = vec![frozen("a", "Thing", &[]), frozen("b", "Thing", &["a"]), frozen("c", "Thing", &[])];

    let token = CancelToken::new();
    let trigger = token.clone();
    let sink = move |event: &solkit_cli::deploy::DeployEvent| {
        if event.item_id == "a" && event.status == ItemState::Done {
            trigger.cancel();
        }
    };

    let report = DeploymentDriver::new(&store, &registry)
        .with_cancel_token(token)
        .deploy(&items, &sink)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.deployed.keys().collect::<Vec<_>>(), vec!["a"]);
    assert!(matches!(report.error("b"), Some(SolkitError::Cancelled { .. })));
    assert!(matches!(report.error("c"), Some(SolkitError::Cancelled { .. })));
    // The table still holds what was created
    assert_eq!(report.remap.new_id("a"), Some(deployed_id("a").as_str()));
}

#[tokio::test]
async fn test_timeout_fails_the_slow_item() {
    let store = MockStore::new().delay_create("slow", Duration::from_millis(500));
    let registry = HandlerRegistry::with_defaults();
    let items = vec![frozen("slow", "Thing", &[]), frozen("fast", "Thing", &[])];

    let report = DeploymentDriver::new(&store, &registry)
        .with_options(DeployOptions::default().with_item_timeout(Duration::from_millis(20)))
        .deploy(&items, &NoopSink)
        .await
        .unwrap();

    match report.error("slow") {
        Some(SolkitError::CreateFailure {
            reason,
            ..
        }) => assert!(reason.contains("timed out")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(report.deployed.contains_key("fast"));
}

#[tokio::test]
async fn test_post_process_failure_keeps_created_item() {
    let store = MockStore::new().fail_update("wma");
    let registry = HandlerRegistry::with_defaults();

    let report = DeploymentDriver::new(&store, &registry).deploy(&app_stack(), &NoopSink).await.unwrap();

    assert!(matches!(report.error("wma"), Some(SolkitError::PostProcessFailure { .. })));
    // Created, so the mapping is recorded
    assert_eq!(report.remap.new_id("wma"), Some(deployed_id("wma").as_str()));
    assert_eq!(report.deployed.len(), 2);
}
