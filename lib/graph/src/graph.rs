//! The canonical `{nodes, edges}` graph document.
//!
//! This is the shape every other component agrees on: the store owns one,
//! history snapshots are copies of one, and the codec reads and writes one.
//! Node order is render order and is preserved through every operation.

use crate::edge::Edge;
use crate::node::Node;
use flowcanvas_core::{EdgeId, NodeId};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A canvas graph: ordered nodes plus the edges between them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Nodes in render order.
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Edges in creation order.
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl GraphDocument {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a graph from nodes and edges.
    #[must_use]
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// Returns true if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns a node by its ID.
    #[must_use]
    pub fn node(&self, node_id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == node_id)
    }

    /// Returns a mutable node by its ID.
    pub fn node_mut(&mut self, node_id: &NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| &n.id == node_id)
    }

    /// Returns true if a node with the given ID exists.
    #[must_use]
    pub fn contains_node(&self, node_id: &NodeId) -> bool {
        self.node(node_id).is_some()
    }

    /// Returns an edge by its ID.
    #[must_use]
    pub fn edge(&self, edge_id: &EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| &e.id == edge_id)
    }

    /// Returns the edges leaving a node.
    pub fn outgoing<'a>(&'a self, node_id: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| &e.source == node_id)
    }

    /// Returns the edges entering a node.
    pub fn incoming<'a>(&'a self, node_id: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| &e.target == node_id)
    }

    /// Returns nodes that have no incoming edges (entry points).
    pub fn entry_nodes(&self) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| self.incoming(&n.id).next().is_none())
            .collect()
    }

    /// Returns the selected nodes in render order.
    pub fn selected_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.selected)
    }

    /// Builds a petgraph view of the graph.
    ///
    /// Node weights are positions in `self.nodes`. Edges whose endpoints are
    /// missing are left out; the returned map resolves IDs to graph indices.
    #[must_use]
    pub fn to_digraph(&self) -> (DiGraph<usize, usize>, HashMap<NodeId, NodeIndex>) {
        let mut graph = DiGraph::with_capacity(self.nodes.len(), self.edges.len());
        let mut index_map = HashMap::with_capacity(self.nodes.len());

        for (position, node) in self.nodes.iter().enumerate() {
            let index = graph.add_node(position);
            index_map.entry(node.id.clone()).or_insert(index);
        }

        for (position, edge) in self.edges.iter().enumerate() {
            let (Some(&source), Some(&target)) =
                (index_map.get(&edge.source), index_map.get(&edge.target))
            else {
                continue;
            };
            graph.add_edge(source, target, position);
        }

        (graph, index_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeKind, Position};

    fn node(id: &str, kind: NodeKind) -> Node {
        Node::with_id(NodeId::new(id), kind, Position::default())
    }

    fn chain() -> GraphDocument {
        GraphDocument::from_parts(
            vec![node("t", NodeKind::Trigger), node("h", NodeKind::Http)],
            vec![Edge::new(NodeId::new("t"), NodeId::new("h"))],
        )
    }

    #[test]
    fn entry_nodes_returns_nodes_without_incoming() {
        let graph = chain();
        let entries = graph.entry_nodes();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id.as_str(), "t");
    }

    #[test]
    fn outgoing_and_incoming_follow_edges() {
        let graph = chain();
        let t = NodeId::new("t");
        let h = NodeId::new("h");
        assert_eq!(graph.outgoing(&t).count(), 1);
        assert_eq!(graph.incoming(&h).count(), 1);
        assert_eq!(graph.incoming(&t).count(), 0);
    }

    #[test]
    fn digraph_skips_dangling_edges() {
        let mut graph = chain();
        graph
            .edges
            .push(Edge::new(NodeId::new("h"), NodeId::new("ghost")));
        let (digraph, index_map) = graph.to_digraph();
        assert_eq!(digraph.node_count(), 2);
        assert_eq!(digraph.edge_count(), 1);
        assert!(index_map.contains_key(&NodeId::new("h")));
    }

    #[test]
    fn graph_serde_roundtrip() {
        let graph = chain();
        let json = serde_json::to_string(&graph).expect("serialize");
        let parsed: GraphDocument = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, graph);
    }
}
