//! Capture from one store, freeze, save, and deploy into another.

use serde_json::json;
use solkit_cli::capture::{capture_solution, freeze_items};
use solkit_cli::core::{Item, kinds};
use solkit_cli::deploy::{DeploymentDriver, NoopSink};
use solkit_cli::handlers::HandlerRegistry;
use solkit_cli::solution::{self, Solution};
use solkit_cli::store::GROUP_PAGE_SIZE;
use solkit_cli::test_utils::{MockStore, deployed_id, hosted_service_url};
use tempfile::TempDir;

const SERVICE_URL: &str = "https://services.example.com/arcgis/rest/services/Parcels/FeatureServer";

fn source_portal() -> MockStore {
    MockStore::new()
        .with_item(
            Item::new("wma", kinds::WEB_MAPPING_APPLICATION)
                .with_title("Parcel viewer")
                .with_url("https://apps.example.com/viewer/index.html?appid=wma")
                .with_body(json!({"values": {"webmap": "map", "title": "Parcels"}})),
        )
        .with_item(Item::new("map", kinds::WEB_MAP).with_body(json!({
            "operationalLayers": [{"itemId": "svc", "url": format!("{SERVICE_URL}/0")}],
            "baseMap": {"baseMapLayers": [{"itemId": "basemap"}]}
        })))
        .with_item(Item::new("svc", kinds::FEATURE_SERVICE).with_url(SERVICE_URL))
        .with_resources("wma", &["config/settings.json", "thumbnail.png"])
}

#[tokio::test]
async fn test_capture_freeze_and_redeploy() {
    let registry = HandlerRegistry::with_defaults();
    let source = source_portal();

    let mut capture = capture_solution(&source, &registry, &["wma".to_string()]).await.unwrap();
    assert_eq!(capture.external, vec!["basemap"]);
    assert_eq!(capture.items[0].resources, vec!["config/settings.json", "thumbnail.png"]);
    freeze_items(&mut capture.items, &registry);

    let temp = TempDir::new().unwrap();
    let path = temp.path().join("parcels.json");
    Solution::new("parcels", capture.items).with_external(capture.external).save(&path).unwrap();

    let loaded = Solution::load(&path).unwrap();
    let report = solution::validate(&loaded, &registry);
    assert!(report.is_valid(), "{:?}", report.issues);
    assert_eq!(report.order, Some(vec!["svc".to_string(), "map".to_string(), "wma".to_string()]));

    let target = MockStore::new();
    let deployment =
        DeploymentDriver::new(&target, &registry).deploy(&loaded.items, &NoopSink).await.unwrap();
    assert!(deployment.is_success(), "{}", deployment.summary());

    let map = target.created_item("map").unwrap();
    let layer = &map.body["operationalLayers"][0];
    assert_eq!(layer["itemId"], deployed_id("svc"));
    assert_eq!(layer["url"], format!("{}/0", hosted_service_url(&deployed_id("svc"))));
    assert_eq!(map.body["baseMap"]["baseMapLayers"][0]["itemId"], "basemap");

    let app = target.created_item("wma").unwrap();
    assert_eq!(app.body["values"]["webmap"], deployed_id("map"));
    assert_eq!(app.title, "Parcel viewer");
    assert!(target.calls().contains(&format!("update {}", deployed_id("wma"))));
}

#[tokio::test]
async fn test_group_members_are_paged() {
    let registry = HandlerRegistry::with_defaults();
    let members: Vec<String> = (0..GROUP_PAGE_SIZE + 50).map(|i| format!("m{i:03}")).collect();
    let member_refs: Vec<&str> = members.iter().map(String::as_str).collect();

    let mut store = MockStore::new()
        .with_item(Item::new("g", kinds::GROUP).with_title("Field crews"))
        .with_group("g", &member_refs);
    for member in &members {
        store = store.with_item(Item::new(member.as_str(), "Form"));
    }

    let capture = capture_solution(&store, &registry, &["g".to_string()]).await.unwrap();

    let calls = store.calls();
    assert!(calls.contains(&"list g 1".to_string()));
    assert!(calls.contains(&format!("list g {}", GROUP_PAGE_SIZE + 1)));
    assert_eq!(capture.items.len(), members.len() + 1);

    let group = &capture.items[0];
    assert_eq!(group.dependencies, members);
    assert_eq!(group.body["members"].as_array().map(Vec::len), Some(members.len()));
}
