//! Graph algorithms for schedule dependency analysis.
//!
//! This module provides the in-memory precedence graph built from stored
//! dependency edges, with reachability checks for cycle rejection and a
//! deterministic topological order for forward schedule propagation.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::DependencyType;

/// A precedence edge as seen by the graph algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphEdge {
    pub predecessor: i64,
    pub successor: i64,
    pub dep_type: DependencyType,
    pub lag: i64,
}

impl GraphEdge {
    /// Create a finish-to-start edge with the given lag.
    pub fn finish_to_start(predecessor: i64, successor: i64, lag: i64) -> Self {
        Self {
            predecessor,
            successor,
            dep_type: DependencyType::FinishToStart,
            lag,
        }
    }
}

/// Directed graph of precedence constraints over schedulable nodes.
///
/// Node and adjacency maps are ordered so every traversal is deterministic.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeSet<i64>,

    /// Outgoing edges keyed by predecessor
    successors: BTreeMap<i64, Vec<GraphEdge>>,

    /// Incoming edges keyed by successor
    predecessors: BTreeMap<i64, Vec<GraphEdge>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from node ids and edges. Edge endpoints are added as nodes.
    pub fn from_parts(
        nodes: impl IntoIterator<Item = i64>,
        edges: impl IntoIterator<Item = GraphEdge>,
    ) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            graph.add_node(node);
        }
        for edge in edges {
            graph.add_edge(edge);
        }
        graph
    }

    /// Add a node. No-op if it already exists.
    pub fn add_node(&mut self, node: i64) {
        self.nodes.insert(node);
    }

    /// Insert an edge without validation.
    ///
    /// Callers that need the acyclic guarantee check [`would_create_cycle`]
    /// first.
    ///
    /// [`would_create_cycle`]: DependencyGraph::would_create_cycle
    pub fn add_edge(&mut self, edge: GraphEdge) {
        self.add_node(edge.predecessor);
        self.add_node(edge.successor);
        self.successors
            .entry(edge.predecessor)
            .or_default()
            .push(edge);
        self.predecessors
            .entry(edge.successor)
            .or_default()
            .push(edge);
    }

    /// Returns true if an edge already exists for the ordered pair.
    pub fn contains_edge(&self, predecessor: i64, successor: i64) -> bool {
        self.successors
            .get(&predecessor)
            .is_some_and(|edges| edges.iter().any(|e| e.successor == successor))
    }

    /// Incoming edges of a node.
    pub fn predecessors(&self, node: i64) -> &[GraphEdge] {
        self.predecessors
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Outgoing edges of a node.
    pub fn successors(&self, node: i64) -> &[GraphEdge] {
        self.successors
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Check whether `to` is reachable from `from` following edge direction.
    pub fn has_path(&self, from: i64, to: i64) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];

        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            for edge in self.successors(current) {
                if !visited.contains(&edge.successor) {
                    stack.push(edge.successor);
                }
            }
        }

        false
    }

    /// Check if inserting `predecessor -> successor` would close a cycle.
    ///
    /// A cycle forms when the predecessor is already reachable from the
    /// successor. Self-loops count as cycles.
    pub fn would_create_cycle(&self, predecessor: i64, successor: i64) -> bool {
        predecessor == successor || self.has_path(successor, predecessor)
    }

    /// Kahn's algorithm. Ready nodes are taken in ascending id order.
    ///
    /// Returns `None` if the graph contains a cycle.
    pub fn topological_order(&self) -> Option<Vec<i64>> {
        let mut in_degree: BTreeMap<i64, usize> = self
            .nodes
            .iter()
            .map(|n| (*n, self.predecessors(*n).len()))
            .collect();

        let mut ready: BTreeSet<i64> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(n, _)| *n)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(node) = ready.pop_first() {
            order.push(node);
            for edge in self.successors(node) {
                if let Some(degree) = in_degree.get_mut(&edge.successor) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(edge.successor);
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            Some(order)
        } else {
            None
        }
    }
}
