//! Build order, top-level items and hierarchy projection.

use solkit_cli::core::SolkitError;
use solkit_cli::graph::{
    GraphBuilder, HierarchyNode, Strictness, TopologicalSorter, hierarchy, top_level,
};
use solkit_cli::handlers::HandlerRegistry;
use solkit_cli::templating::templatize;

use super::items;

fn node(id: &str, deps: Vec<HierarchyNode>) -> HierarchyNode {
    HierarchyNode {
        id: id.to_string(),
        dependencies: deps,
    }
}

fn order(layout: &[(&str, &[&str])]) -> Result<Vec<String>, SolkitError> {
    let registry = HandlerRegistry::with_defaults();
    let graph = GraphBuilder::new(&registry).build(&items(layout));
    TopologicalSorter::new().sort(&graph)
}

#[test]
fn test_app_map_service_chain() {
    let layout: &[(&str, &[&str])] = &[("wma", &["map"]), ("map", &["svc"]), ("svc", &[])];
    assert_eq!(order(layout).unwrap(), vec!["svc", "map", "wma"]);

    let collection = items(layout);
    assert_eq!(top_level(&collection), vec!["wma"]);

    let tree = hierarchy(&collection, Strictness::Strict).unwrap();
    assert_eq!(tree.roots, vec![node("wma", vec![node("map", vec![HierarchyNode::leaf("svc")])])]);
}

#[test]
fn test_shared_leaves_are_repeated() {
    let layout: &[(&str, &[&str])] =
        &[("abc", &["def", "ghi"]), ("jkl", &["ghi", "def"]), ("def", &[]), ("ghi", &[])];
    let collection = items(layout);
    assert_eq!(top_level(&collection), vec!["abc", "jkl"]);

    let tree = hierarchy(&collection, Strictness::Strict).unwrap();
    assert_eq!(
        tree.roots,
        vec![
            node("abc", vec![HierarchyNode::leaf("def"), HierarchyNode::leaf("ghi")]),
            node("jkl", vec![HierarchyNode::leaf("ghi"), HierarchyNode::leaf("def")]),
        ]
    );

    let sorted = order(layout).unwrap();
    let position = |id: &str| sorted.iter().position(|x| x == id).unwrap();
    assert!(position("def") < position("abc"));
    assert!(position("ghi") < position("jkl"));
}

#[test]
fn test_placeholder_dependencies_match_raw_ones() {
    let raw: &[(&str, &[&str])] = &[("map", &["svc"]), ("svc", &[])];
    let frozen_svc = templatize("svc");
    let frozen: &[(&str, &[&str])] = &[("map", &[frozen_svc.as_str()]), ("svc", &[])];
    assert_eq!(order(raw).unwrap(), order(frozen).unwrap());
}

#[test]
fn test_sort_is_repeatable() {
    let layout: &[(&str, &[&str])] =
        &[("e", &["a"]), ("d", &[]), ("c", &["d"]), ("b", &["a", "d"]), ("a", &[])];
    let first = order(layout).unwrap();
    for _ in 0..10 {
        assert_eq!(order(layout).unwrap(), first);
    }
    // Independent items keep their input order
    assert_eq!(first, vec!["d", "c", "a", "e", "b"]);
}

#[test]
fn test_mutual_dependency_is_a_cycle() {
    let err = order(&[("a", &["b"]), ("b", &["a"]), ("c", &[])]).unwrap_err();
    match err {
        SolkitError::CyclicalDependency {
            ids,
            chain,
        } => {
            assert_eq!(ids, vec!["a", "b"]);
            assert_eq!(chain, "a → b → a");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_top_level_dedupes_before_filtering() {
    let collection = items(&[("a", &["b"]), ("a", &["b"]), ("b", &[])]);
    assert_eq!(top_level(&collection), vec!["a"]);
}

#[test]
fn test_missing_dependency_strictness() {
    let collection = items(&[("app", &["gone"])]);
    assert!(matches!(
        hierarchy(&collection, Strictness::Strict),
        Err(SolkitError::LookupFailure { .. })
    ));

    let lenient = hierarchy(&collection, Strictness::Lenient).unwrap();
    assert_eq!(lenient.roots, vec![HierarchyNode::leaf("app")]);
    assert_eq!(lenient.missing, vec!["gone"]);
}
