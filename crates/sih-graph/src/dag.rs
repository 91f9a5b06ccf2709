//! Dependency edges
//!
//! An edge `(from, to)` means `from` is realized after `to`. Cycles are
//! rejected at insertion time with a reachability check from `to` back to
//! `from`, so the edge set stays acyclic without a full re-sort per call.

use crate::node::NodeRef;
use petgraph::algo::{has_path_connecting, kosaraju_scc};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Explicit "must exist before" edges between nodes
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    inner: DiGraphMap<NodeRef, ()>,
    edges: Vec<(NodeRef, NodeRef)>,
}

impl DependencyGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whether adding `from -> to` would close a cycle
    #[must_use]
    pub fn would_cycle(&self, from: NodeRef, to: NodeRef) -> bool {
        if from == to {
            return true;
        }
        self.inner.contains_node(to)
            && self.inner.contains_node(from)
            && has_path_connecting(&self.inner, to, from, None)
    }

    /// Record the edge. Returns `false` when it already existed.
    ///
    /// Callers check [`would_cycle`](Self::would_cycle) first.
    pub(crate) fn insert(&mut self, from: NodeRef, to: NodeRef) -> bool {
        if self.inner.contains_edge(from, to) {
            return false;
        }
        self.inner.add_edge(from, to, ());
        self.edges.push((from, to));
        true
    }

    /// Nodes `node` depends on, in insertion order
    #[must_use]
    pub fn dependencies_of(&self, node: NodeRef) -> Vec<NodeRef> {
        self.edges
            .iter()
            .filter(|(from, _)| *from == node)
            .map(|(_, to)| *to)
            .collect()
    }

    /// Nodes depending on `node`, in insertion order
    #[must_use]
    pub fn dependents_of(&self, node: NodeRef) -> Vec<NodeRef> {
        self.edges
            .iter()
            .filter(|(_, to)| *to == node)
            .map(|(from, _)| *from)
            .collect()
    }

    /// All edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = (NodeRef, NodeRef)> + '_ {
        self.edges.iter().copied()
    }

    /// Number of explicit edges
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

/// Order `nodes` so that every dependency precedes its dependents
///
/// `edges` are `(from, to)` pairs with `from` depending on `to`; edges with
/// an endpoint outside `nodes` are ignored. Among nodes that are ready at
/// the same time the smallest handle goes first, which makes the order
/// follow creation order wherever the edges allow it.
///
/// # Errors
///
/// One cycle when the edges contain any, as a path where each node depends
/// on the next and the last depends on the first. A node depending on
/// itself is a one-node cycle.
pub fn stable_topological_order<I>(nodes: &[NodeRef], edges: I) -> Result<Vec<NodeRef>, Vec<NodeRef>>
where
    I: IntoIterator<Item = (NodeRef, NodeRef)>,
{
    let mut graph: DiGraphMap<NodeRef, ()> = DiGraphMap::new();
    for node in nodes {
        graph.add_node(*node);
    }
    for (from, to) in edges {
        if graph.contains_node(from) && graph.contains_node(to) {
            graph.add_edge(to, from, ());
        }
    }

    let mut pending: HashMap<NodeRef, usize> = graph
        .nodes()
        .map(|n| (n, graph.neighbors_directed(n, Direction::Incoming).count()))
        .collect();
    let mut ready: BinaryHeap<Reverse<NodeRef>> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(n, _)| Reverse(*n))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for dependent in graph.neighbors_directed(node, Direction::Outgoing) {
            if let Some(count) = pending.get_mut(&dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }
    }

    if order.len() == graph.node_count() {
        Ok(order)
    } else {
        Err(find_cycle(&graph))
    }
}

/// Cycle through the smallest node that lies on one
///
/// Edges run from dependency to dependent, so a node's dependencies are its
/// incoming neighbours.
fn find_cycle(graph: &DiGraphMap<NodeRef, ()>) -> Vec<NodeRef> {
    let component = kosaraju_scc(graph)
        .into_iter()
        .filter(|c| c.len() > 1 || c.iter().any(|n| graph.contains_edge(*n, *n)))
        .min_by_key(|c| c.iter().min().copied());
    let Some(component) = component else {
        return Vec::new();
    };

    let mut path: Vec<NodeRef> = Vec::new();
    let mut current = component.iter().min().copied();
    while let Some(node) = current {
        if let Some(start) = path.iter().position(|n| *n == node) {
            return path.split_off(start);
        }
        path.push(node);
        current = graph
            .neighbors_directed(node, Direction::Incoming)
            .filter(|d| component.contains(d))
            .min();
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: u32) -> NodeRef {
        NodeRef::new(i)
    }

    #[test]
    fn detects_cycles_incrementally() {
        let mut g = DependencyGraph::new();
        assert!(g.insert(n(0), n(1)));
        assert!(g.insert(n(1), n(2)));
        assert!(g.would_cycle(n(2), n(0)));
        assert!(g.would_cycle(n(1), n(1)));
        assert!(!g.would_cycle(n(0), n(2)));
        assert!(!g.insert(n(0), n(1)));
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn neighbours_in_insertion_order() {
        let mut g = DependencyGraph::new();
        g.insert(n(3), n(1));
        g.insert(n(3), n(0));
        g.insert(n(2), n(0));
        assert_eq!(g.dependencies_of(n(3)), vec![n(1), n(0)]);
        assert_eq!(g.dependents_of(n(0)), vec![n(3), n(2)]);
    }

    #[test]
    fn order_follows_creation_without_edges() {
        let nodes = [n(0), n(1), n(2)];
        let order = stable_topological_order(&nodes, []).unwrap();
        assert_eq!(order, nodes);
    }

    #[test]
    fn order_moves_dependencies_forward() {
        let nodes = [n(0), n(1), n(2), n(3)];
        // 0 depends on 3, 1 depends on 2
        let order = stable_topological_order(&nodes, [(n(0), n(3)), (n(1), n(2))]).unwrap();
        assert_eq!(order, vec![n(2), n(1), n(3), n(0)]);
    }

    #[test]
    fn order_reports_cycles() {
        let nodes = [n(0), n(1), n(2), n(3)];
        // 3 sits downstream of the 1 -> 2 -> 1 cycle
        let edges = [(n(1), n(2)), (n(2), n(1)), (n(3), n(1)), (n(0), n(3))];
        let err = stable_topological_order(&nodes, edges).unwrap_err();
        assert_eq!(err, vec![n(1), n(2)]);
    }

    #[test]
    fn self_edges_are_one_node_cycles() {
        let nodes = [n(0), n(1)];
        let err = stable_topological_order(&nodes, [(n(0), n(1)), (n(1), n(1))]).unwrap_err();
        assert_eq!(err, vec![n(1)]);
    }

    #[test]
    fn cycle_path_follows_dependencies() {
        let nodes = [n(0), n(1), n(2)];
        // 0 depends on 2, 2 on 1, 1 on 0
        let edges = [(n(0), n(2)), (n(2), n(1)), (n(1), n(0))];
        let err = stable_topological_order(&nodes, edges).unwrap_err();
        assert_eq!(err, vec![n(0), n(2), n(1)]);
    }
}
