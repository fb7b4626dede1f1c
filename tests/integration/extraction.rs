//! Per-kind dependency rules through the public extractor.

use serde_json::json;
use solkit_cli::core::{Item, kinds};
use solkit_cli::extract::DependencyExtractor;
use solkit_cli::graph::GraphBuilder;
use solkit_cli::handlers::HandlerRegistry;

#[test]
fn test_dashboard_returns_map_widget_only() {
    let registry = HandlerRegistry::with_defaults();
    let dashboard = Item::new("dash", kinds::DASHBOARD).with_body(json!({
        "widgets": [
            {"type": "mapWidget", "itemId": "map1", "mapTools": []},
            {"type": "indicatorWidget", "datasets": [{"dataSource": {"itemId": "svc9"}}]},
            {"type": "headerPanel"}
        ]
    }));
    let extraction = DependencyExtractor::new(&registry).extract(&dashboard);
    assert_eq!(extraction.unique_ids(), vec!["map1"]);
    assert!(extraction.faults.is_empty());
}

#[test]
fn test_story_without_sections_has_no_dependencies() {
    let registry = HandlerRegistry::with_defaults();
    let story = Item::new("story", kinds::STORY_MAP)
        .with_keywords(["Story Map", "Cascade"])
        .with_body(json!({"values": {"title": "Empty story"}}));
    let extraction = DependencyExtractor::new(&registry).extract(&story);
    assert!(extraction.unique_ids().is_empty());
    assert!(extraction.faults.is_empty());
}

#[test]
fn test_web_app_reads_map_and_group() {
    let registry = HandlerRegistry::with_defaults();
    let app = Item::new("app", kinds::WEB_MAPPING_APPLICATION)
        .with_body(json!({"values": {"webmap": "map1", "group": "grp1"}}));
    let extraction = DependencyExtractor::new(&registry).extract(&app);
    assert_eq!(extraction.unique_ids(), vec!["map1", "grp1"]);
}

#[test]
fn test_unknown_kind_has_no_dependencies() {
    let registry = HandlerRegistry::with_defaults();
    let item = Item::new("x", "Code Attachment").with_body(json!({"itemId": "looks-like-a-ref"}));
    assert!(DependencyExtractor::new(&registry).extract(&item).unique_ids().is_empty());
}

#[test]
fn test_malformed_segment_keeps_partial_results() {
    let registry = HandlerRegistry::with_defaults();
    let map = Item::new("map", kinds::WEB_MAP).with_body(json!({
        "operationalLayers": [{"itemId": "svc1"}, "not-a-layer", {"itemId": 42}],
        "tables": [{"itemId": "svc2"}]
    }));
    let graph = GraphBuilder::new(&registry).build(&[map]);
    assert_eq!(graph.dependencies_of("map"), ["svc1", "svc2"]);
    assert_eq!(graph.faults().len(), 2);
}
