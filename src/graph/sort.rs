//! Deterministic topological ordering.

use petgraph::Direction;
use petgraph::graph::NodeIndex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use super::DependencyGraph;
use crate::core::SolkitError;

/// Orders a [`DependencyGraph`] so every item follows its dependencies.
///
/// Uses Kahn's algorithm with the ready set kept in a min-heap of input
/// positions: whenever several items are eligible, the one supplied first
/// wins. The same input therefore always yields the same order.
/// Only in-graph dependencies count; external references are assumed to be
/// satisfied already.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologicalSorter;

impl TopologicalSorter {
    /// Create a sorter.
    pub const fn new() -> Self {
        Self
    }

    /// Build order for `graph`, dependencies first.
    ///
    /// # Errors
    ///
    /// [`SolkitError::CyclicalDependency`] if some items can never become
    /// ready. No partial order is returned.
    pub fn sort(&self, graph: &DependencyGraph) -> Result<Vec<String>, SolkitError> {
        let inner = graph.inner();

        // Unsatisfied in-graph dependencies per node
        let mut pending: Vec<usize> =
            inner.node_indices().map(|index| inner.neighbors(index).count()).collect();

        let mut ready: BinaryHeap<Reverse<NodeIndex>> = inner
            .node_indices()
            .filter(|index| pending[index.index()] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(inner.node_count());
        while let Some(Reverse(index)) = ready.pop() {
            order.push(inner[index].clone());
            for dependent in inner.neighbors_directed(index, Direction::Incoming) {
                let slot = &mut pending[dependent.index()];
                *slot -= 1;
                if *slot == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() == inner.node_count() {
            tracing::debug!("Build order: {}", order.join(", "));
            return Ok(order);
        }

        let stuck: Vec<NodeIndex> =
            inner.node_indices().filter(|index| pending[index.index()] > 0).collect();
        let chain = cycle_chain(graph, &stuck);
        Err(SolkitError::CyclicalDependency {
            ids: stuck.iter().map(|&index| inner[index].clone()).collect(),
            chain,
        })
    }
}

/// Find one concrete cycle among the nodes left over by the sort.
///
/// Every leftover node still has a leftover dependency, so following the
/// lowest-indexed one from any start must eventually revisit a node.
fn cycle_chain(graph: &DependencyGraph, stuck: &[NodeIndex]) -> String {
    let inner = graph.inner();
    let stuck_set: HashSet<NodeIndex> = stuck.iter().copied().collect();
    let Some(&start) = stuck.first() else {
        return String::new();
    };

    let mut path: Vec<NodeIndex> = Vec::new();
    let mut current = start;
    loop {
        if let Some(pos) = path.iter().position(|&n| n == current) {
            let mut cycle: Vec<&str> = path[pos..].iter().map(|&n| inner[n].as_str()).collect();
            cycle.push(inner[current].as_str());
            return cycle.join(" → ");
        }
        path.push(current);
        match inner.neighbors(current).filter(|n| stuck_set.contains(n)).min() {
            Some(next) => current = next,
            None => break,
        }
    }

    // Unreachable for a stalled sort; fall back to listing the ids
    stuck.iter().map(|&n| inner[n].as_str()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Item;
    use crate::graph::GraphBuilder;

    fn graph(layout: &[(&str, &[&str])]) -> DependencyGraph {
        let items: Vec<Item> = layout
            .iter()
            .map(|(id, deps)| Item::new(*id, "Thing").with_dependencies(deps.iter().copied()))
            .collect();
        GraphBuilder::declared().build(&items)
    }

    #[test]
    fn test_simple_chain() {
        let g = graph(&[("wma", &["map"]), ("map", &["svc"]), ("svc", &[])]);
        assert_eq!(TopologicalSorter::new().sort(&g).unwrap(), vec!["svc", "map", "wma"]);
    }

    #[test]
    fn test_ties_follow_input_order() {
        let g = graph(&[("c", &[]), ("a", &[]), ("b", &[]), ("top", &["b", "a", "c"])]);
        let order = TopologicalSorter::new().sort(&g).unwrap();
        assert_eq!(order, vec!["c", "a", "b", "top"]);
        assert_eq!(TopologicalSorter::new().sort(&g).unwrap(), order);
    }

    #[test]
    fn test_diamond() {
        let g = graph(&[("a", &["b", "c"]), ("b", &["d"]), ("c", &["d"]), ("d", &[])]);
        assert_eq!(TopologicalSorter::new().sort(&g).unwrap(), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn test_external_references_do_not_block() {
        let g = graph(&[("a", &["elsewhere"])]);
        assert_eq!(TopologicalSorter::new().sort(&g).unwrap(), vec!["a"]);
    }

    #[test]
    fn test_two_node_cycle() {
        let g = graph(&[("a", &["b"]), ("b", &["a"]), ("free", &[])]);
        let err = TopologicalSorter::new().sort(&g).unwrap_err();
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
    fn test_self_dependency_is_cycle() {
        let g = graph(&[("a", &["a"])]);
        let err = TopologicalSorter::new().sort(&g).unwrap_err();
        assert!(err.to_string().contains("a → a"));
    }

    #[test]
    fn test_dependent_of_cycle_is_reported() {
        let g = graph(&[("top", &["x"]), ("x", &["y"]), ("y", &["x"])]);
        match TopologicalSorter::new().sort(&g).unwrap_err() {
            SolkitError::CyclicalDependency {
                ids,
                chain,
            } => {
                assert_eq!(ids, vec!["top", "x", "y"]);
                assert_eq!(chain, "x → y → x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_graph() {
        assert!(TopologicalSorter::new().sort(&DependencyGraph::new()).unwrap().is_empty());
    }
}
