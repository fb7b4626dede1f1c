//! Dependency graph construction.
//!
//! [`GraphBuilder`] turns a collection of items into a [`DependencyGraph`]:
//! one node per item, keyed by the item's original identifier, with an edge
//! from each item to every dependency that is itself part of the
//! collection. Dependencies outside the collection stay in the item's list
//! but get no node; consumers treat them as external and already satisfied.
//!
//! Identifiers are always stored raw. Placeholder tokens found in frozen
//! items are detemplatized on the way in, so a graph built from a captured
//! solution and one built from the live source have the same keys.
//!
//! ```rust,no_run
//! use solkit_cli::graph::{GraphBuilder, TopologicalSorter};
//! use solkit_cli::handlers::HandlerRegistry;
//! # fn demo(items: &[solkit_cli::core::Item]) -> anyhow::Result<()> {
//! let registry = HandlerRegistry::with_defaults();
//! let graph = GraphBuilder::new(&registry).build(items);
//! let order = TopologicalSorter::new().sort(&graph)?;
//! # Ok(())
//! # }
//! ```

pub mod hierarchy;
pub mod sort;

pub use hierarchy::{Hierarchy, HierarchyNode, HierarchyProjector, Strictness, hierarchy, top_level};
pub use sort::TopologicalSorter;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::core::{Item, SolkitError};
use crate::extract::{DependencyExtractor, dedupe};
use crate::handlers::HandlerRegistry;
use crate::templating;

/// Directed graph of items keyed by original identifier.
///
/// Node indices follow input order, which the sorter uses to break ties.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Edge `a -> b` means `a` depends on `b`.
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
    /// Deduplicated dependency list per item, dangling ids included.
    dependencies: HashMap<String, Vec<String>>,
    faults: Vec<SolkitError>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item node with its dependency list.
    ///
    /// Returns `false` (and changes nothing) if the id is already present.
    fn add_item(&mut self, id: &str, dependencies: Vec<String>) -> bool {
        if self.node_map.contains_key(id) {
            return false;
        }
        let index = self.graph.add_node(id.to_string());
        self.node_map.insert(id.to_string(), index);
        self.dependencies.insert(id.to_string(), dependencies);
        true
    }

    /// Create edges once every node exists.
    fn link(&mut self) {
        for index in self.graph.node_indices().collect::<Vec<_>>() {
            let id = self.graph[index].clone();
            let Some(deps) = self.dependencies.get(&id) else {
                continue;
            };
            for dep in deps {
                if let Some(&target) = self.node_map.get(dep)
                    && !self.graph.contains_edge(index, target)
                {
                    self.graph.add_edge(index, target, ());
                }
            }
        }
    }

    /// Whether `id` is a node of this graph.
    pub fn contains(&self, id: &str) -> bool {
        self.node_map.contains_key(id)
    }

    /// Number of items in the graph.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of in-graph dependency edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Item identifiers in input order.
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.graph.node_indices().map(move |index| self.graph[index].as_str())
    }

    /// Deduplicated dependencies of `id`, dangling identifiers included.
    ///
    /// Empty for ids that are not in the graph.
    pub fn dependencies_of(&self, id: &str) -> &[String] {
        self.dependencies.get(id).map_or(&[], Vec::as_slice)
    }

    /// Items that directly depend on `id`, in input order.
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        let Some(&index) = self.node_map.get(id) else {
            return Vec::new();
        };
        let mut dependents: Vec<NodeIndex> =
            self.graph.neighbors_directed(index, Direction::Incoming).collect();
        dependents.sort_unstable();
        dependents.dedup();
        dependents.into_iter().map(|i| self.graph[i].as_str()).collect()
    }

    /// Dependency identifiers that are not items of this graph, first-seen order.
    pub fn external_references(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.ids()
            .flat_map(|id| self.dependencies_of(id))
            .map(String::as_str)
            .filter(|dep| !self.contains(dep) && seen.insert(*dep))
            .collect()
    }

    /// Extraction faults recovered while building the graph.
    pub fn faults(&self) -> &[SolkitError] {
        &self.faults
    }

    pub(crate) fn inner(&self) -> &DiGraph<String, ()> {
        &self.graph
    }
}

/// Builds a [`DependencyGraph`] from items.
pub struct GraphBuilder<'a> {
    extractor: Option<DependencyExtractor<'a>>,
}

impl<'a> GraphBuilder<'a> {
    /// Builder that extracts dependencies from each body and unions them with
    /// the dependencies already listed on the item.
    pub fn new(registry: &'a HandlerRegistry) -> Self {
        Self {
            extractor: Some(DependencyExtractor::new(registry)),
        }
    }

    /// Builder that only uses the dependencies already listed on each item.
    pub fn declared() -> Self {
        Self {
            extractor: None,
        }
    }

    /// Build the graph. Never fails.
    pub fn build(&self, items: &[Item]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();

        for item in items {
            let mut raw = templating::detemplatize_all(&item.dependencies);
            if let Some(extractor) = &self.extractor {
                let extraction = extractor.extract(item);
                raw.extend(templating::detemplatize_all(&extraction.ids));
                graph.faults.extend(extraction.faults);
            }
            let deps = dedupe(raw.into_iter().filter(|id| !id.is_empty()));

            if !graph.add_item(&item.id, deps) {
                tracing::warn!("Duplicate item '{}' ignored; keeping the first occurrence", item.id);
            }
        }

        graph.link();
        tracing::debug!(
            "Built dependency graph: {} item(s), {} edge(s), {} external reference(s)",
            graph.len(),
            graph.edge_count(),
            graph.external_references().len()
        );
        graph
    }
}
