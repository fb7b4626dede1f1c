//! Display-oriented hierarchy of items.
//!
//! The hierarchy is a forest rooted at the *top-level* items, those no
//! other item depends on. Each node expands into its dependencies using the
//! same shape. A dependency shared by several parents is expanded again
//! under every one of them, so the forest intentionally repeats subtrees;
//! it is a view for people, not a build plan.
//!
//! Dependencies that are not part of the collection cannot be expanded.
//! What happens then is up to the caller through [`Strictness`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{DependencyGraph, GraphBuilder};
use crate::core::{Item, SolkitError};

/// Policy for dependencies that are missing from the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Fail the whole projection with [`SolkitError::LookupFailure`].
    Strict,
    /// Skip the missing branch and record the id in [`Hierarchy::missing`].
    #[default]
    Lenient,
}

/// One node of the forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    /// Item identifier
    pub id: String,
    /// Expanded dependencies; empty for leaves
    pub dependencies: Vec<HierarchyNode>,
}

impl HierarchyNode {
    /// Leaf node.
    pub fn leaf(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            dependencies: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including this one.
    pub fn size(&self) -> usize {
        1 + self.dependencies.iter().map(Self::size).sum::<usize>()
    }
}

/// Result of a projection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hierarchy {
    /// One tree per top-level item, in input order
    pub roots: Vec<HierarchyNode>,
    /// Ids that were referenced but absent (lenient projections only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

/// Projects a [`DependencyGraph`] into top-level ids and a forest.
pub struct HierarchyProjector<'g> {
    graph: &'g DependencyGraph,
}

impl<'g> HierarchyProjector<'g> {
    /// Projector over an already built graph.
    pub fn new(graph: &'g DependencyGraph) -> Self {
        Self {
            graph,
        }
    }

    /// Ids in input order, minus every id that appears in any dependency list.
    pub fn top_level(&self) -> Vec<String> {
        let referenced: HashSet<&str> = self
            .graph
            .ids()
            .flat_map(|id| self.graph.dependencies_of(id))
            .map(String::as_str)
            .collect();
        self.graph.ids().filter(|id| !referenced.contains(id)).map(str::to_string).collect()
    }

    /// Expand every top-level id into a tree.
    ///
    /// # Errors
    ///
    /// - [`SolkitError::LookupFailure`] for a missing dependency under
    ///   [`Strictness::Strict`]
    /// - [`SolkitError::CyclicalDependency`] if an expansion revisits an id
    ///   on its own path
    pub fn project(&self, strictness: Strictness) -> Result<Hierarchy, SolkitError> {
        let mut hierarchy = Hierarchy::default();
        let mut path = Vec::new();
        for root in self.top_level() {
            let node = self.expand(&root, strictness, &mut path, &mut hierarchy.missing)?;
            hierarchy.roots.push(node);
        }
        if !hierarchy.missing.is_empty() {
            tracing::warn!(
                "Hierarchy skipped {} missing item(s): {}",
                hierarchy.missing.len(),
                hierarchy.missing.join(", ")
            );
        }
        Ok(hierarchy)
    }

    fn expand(
        &self,
        id: &str,
        strictness: Strictness,
        path: &mut Vec<String>,
        missing: &mut Vec<String>,
    ) -> Result<HierarchyNode, SolkitError> {
        if let Some(pos) = path.iter().position(|p| p == id) {
            let mut cycle = path[pos..].to_vec();
            cycle.push(id.to_string());
            return Err(SolkitError::CyclicalDependency {
                ids: path[pos..].to_vec(),
                chain: cycle.join(" → "),
            });
        }

        path.push(id.to_string());
        let mut node = HierarchyNode::leaf(id);
        for dep in self.graph.dependencies_of(id) {
            if !self.graph.contains(dep) {
                match strictness {
                    Strictness::Strict => {
                        return Err(SolkitError::LookupFailure {
                            id: dep.clone(),
                        });
                    }
                    Strictness::Lenient => {
                        if !missing.contains(dep) {
                            missing.push(dep.clone());
                        }
                        continue;
                    }
                }
            }
            node.dependencies.push(self.expand(dep, strictness, path, missing)?);
        }
        path.pop();
        Ok(node)
    }
}

/// Top-level ids of `items`, using each item's listed dependencies.
pub fn top_level(items: &[Item]) -> Vec<String> {
    let graph = GraphBuilder::declared().build(items);
    HierarchyProjector::new(&graph).top_level()
}

/// Forest view of `items`, using each item's listed dependencies.
pub fn hierarchy(items: &[Item], strictness: Strictness) -> Result<Hierarchy, SolkitError> {
    let graph = GraphBuilder::declared().build(items);
    HierarchyProjector::new(&graph).project(strictness)
}
