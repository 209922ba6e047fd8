//! The graph store: single owner of the canvas nodes and edges.
//!
//! Every component reads the live graph through [`GraphStore::current`] and
//! writes it through the narrow mutation API below. The store does not
//! record history itself; callers push a snapshot onto the
//! [`HistoryStack`](crate::history::HistoryStack) *before* each structural
//! mutation.

use crate::connection::validate_connection;
use crate::edge::Edge;
use crate::error::GraphError;
use crate::graph::GraphDocument;
use crate::node::{Node, Position};
use flowcanvas_core::{EdgeId, NodeId};
use serde_json::Value as JsonValue;
use std::collections::HashSet;

/// Owned, mutable canvas graph.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    graph: GraphDocument,
}

impl GraphStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `graph`.
    #[must_use]
    pub fn from_document(graph: GraphDocument) -> Self {
        Self { graph }
    }

    /// Returns the live graph.
    #[must_use]
    pub fn current(&self) -> &GraphDocument {
        &self.graph
    }

    /// Returns a deep copy of the live graph.
    #[must_use]
    pub fn snapshot(&self) -> GraphDocument {
        self.graph.clone()
    }

    /// Replaces the whole graph, returning the previous one.
    pub fn replace_all(&mut self, graph: GraphDocument) -> GraphDocument {
        std::mem::replace(&mut self.graph, graph)
    }

    /// Adds a node.
    ///
    /// # Errors
    ///
    /// Returns an error if a node with the same ID already exists.
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        if self.graph.contains_node(&node.id) {
            return Err(GraphError::DuplicateNode { node_id: node.id });
        }
        let node_id = node.id.clone();
        self.graph.nodes.push(node);
        Ok(node_id)
    }

    /// Adds several nodes, stopping at the first duplicate.
    ///
    /// # Errors
    ///
    /// Returns an error if any node ID already exists. Nodes before the
    /// duplicate stay added.
    pub fn add_nodes(&mut self, nodes: impl IntoIterator<Item = Node>) -> Result<Vec<NodeId>, GraphError> {
        nodes.into_iter().map(|node| self.add_node(node)).collect()
    }

    /// Removes nodes and every edge touching them.
    ///
    /// Returns the number of nodes removed; unknown IDs are ignored.
    pub fn remove_nodes(&mut self, node_ids: &[NodeId]) -> usize {
        let doomed: HashSet<&NodeId> = node_ids.iter().collect();
        let before = self.graph.nodes.len();
        self.graph.nodes.retain(|n| !doomed.contains(&n.id));
        self.graph
            .edges
            .retain(|e| !doomed.contains(&e.source) && !doomed.contains(&e.target));
        before - self.graph.nodes.len()
    }

    /// Replaces a node's data record.
    ///
    /// Edges leaving handles the new data no longer declares are removed, so
    /// shrinking a switch's rule list never leaves dangling branches.
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist.
    pub fn update_node_data(&mut self, node_id: &NodeId, data: JsonValue) -> Result<(), GraphError> {
        let node = self
            .graph
            .node_mut(node_id)
            .ok_or_else(|| GraphError::NodeNotFound {
                node_id: node_id.clone(),
            })?;
        node.data = data;
        let schema = node.handle_schema();
        self.graph
            .edges
            .retain(|e| &e.source != node_id || schema.contains(e.source_handle()));
        Ok(())
    }

    /// Moves nodes to absolute positions in a single write.
    ///
    /// Returns the number of nodes moved; unknown IDs are ignored.
    pub fn set_positions<I>(&mut self, positions: I) -> usize
    where
        I: IntoIterator<Item = (NodeId, Position)>,
    {
        let mut moved = 0;
        for (node_id, position) in positions {
            if let Some(node) = self.graph.node_mut(&node_id) {
                node.position = position;
                moved += 1;
            }
        }
        moved
    }

    /// Pins or unpins a node.
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist.
    pub fn set_pinned(&mut self, node_id: &NodeId, pinned: bool) -> Result<(), GraphError> {
        let node = self
            .graph
            .node_mut(node_id)
            .ok_or_else(|| GraphError::NodeNotFound {
                node_id: node_id.clone(),
            })?;
        node.pinned = pinned;
        Ok(())
    }

    /// Adds an edge if the connection rules accept it.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge ID is taken or the connection is rejected.
    pub fn add_edge(&mut self, edge: Edge) -> Result<EdgeId, GraphError> {
        if self.graph.edge(&edge.id).is_some() {
            return Err(GraphError::DuplicateEdge { edge_id: edge.id });
        }
        validate_connection(&self.graph, &edge.source, &edge.target, edge.source_handle())
            .map_err(|reason| GraphError::ConnectionRejected {
                source: edge.source.clone(),
                target: edge.target.clone(),
                reason,
            })?;
        let edge_id = edge.id.clone();
        self.graph.edges.push(edge);
        Ok(edge_id)
    }

    /// Removes edges by ID.
    ///
    /// Returns the number of edges removed; unknown IDs are ignored.
    pub fn remove_edges(&mut self, edge_ids: &[EdgeId]) -> usize {
        let doomed: HashSet<&EdgeId> = edge_ids.iter().collect();
        let before = self.graph.edges.len();
        self.graph.edges.retain(|e| !doomed.contains(&e.id));
        before - self.graph.edges.len()
    }

    /// Mutates every edge in place.
    ///
    /// Used for overlay state that is not part of the graph's structure.
    pub fn for_each_edge_mut(&mut self, mut f: impl FnMut(&mut Edge)) {
        self.graph.edges.iter_mut().for_each(|edge| f(edge));
    }

    /// Inserts a subgraph whose IDs do not collide with the live graph.
    ///
    /// The current selection is replaced by the inserted nodes. Edges the
    /// connection rules reject are dropped. Returns the inserted node IDs.
    pub fn insert_subgraph(&mut self, subgraph: GraphDocument) -> Vec<NodeId> {
        self.clear_selection();

        let mut inserted = Vec::with_capacity(subgraph.nodes.len());
        for mut node in subgraph.nodes {
            node.selected = true;
            match self.add_node(node) {
                Ok(node_id) => inserted.push(node_id),
                Err(e) => tracing::debug!(error = %e, "Skipping node on insert"),
            }
        }
        for edge in subgraph.edges {
            if let Err(e) = self.add_edge(edge) {
                tracing::debug!(error = %e, "Skipping edge on insert");
            }
        }
        inserted
    }

    /// Adds a node to the selection, or makes it the only selected node.
    pub fn select(&mut self, node_id: &NodeId, additive: bool) {
        if !additive {
            self.clear_selection();
        }
        if let Some(node) = self.graph.node_mut(node_id) {
            node.selected = true;
        }
    }

    /// Selects exactly the given nodes.
    pub fn select_only(&mut self, node_ids: &[NodeId]) {
        let wanted: HashSet<&NodeId> = node_ids.iter().collect();
        for node in &mut self.graph.nodes {
            node.selected = wanted.contains(&node.id);
        }
    }

    /// Selects every node.
    pub fn select_all(&mut self) {
        for node in &mut self.graph.nodes {
            node.selected = true;
        }
    }

    /// Clears the selection.
    pub fn clear_selection(&mut self) {
        for node in &mut self.graph.nodes {
            node.selected = false;
        }
    }

    /// Returns the IDs of selected nodes in render order.
    #[must_use]
    pub fn selected_ids(&self) -> Vec<NodeId> {
        self.graph.selected_nodes().map(|n| n.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionRejection;
    use crate::node::NodeKind;
    use serde_json::json;

    fn node(id: &str, kind: NodeKind) -> Node {
        Node::with_id(NodeId::new(id), kind, Position::default())
    }

    fn id(s: &str) -> NodeId {
        NodeId::new(s)
    }

    fn populated() -> GraphStore {
        let mut store = GraphStore::new();
        store.add_node(node("t", NodeKind::Trigger)).unwrap();
        store.add_node(node("h", NodeKind::Http)).unwrap();
        store.add_node(node("e", NodeKind::Email)).unwrap();
        store.add_edge(Edge::new(id("t"), id("h"))).unwrap();
        store.add_edge(Edge::new(id("h"), id("e"))).unwrap();
        store
    }

    #[test]
    fn add_node_rejects_duplicates() {
        let mut store = populated();
        let err = store.add_node(node("t", NodeKind::Delay)).unwrap_err();
        assert_eq!(err, GraphError::DuplicateNode { node_id: id("t") });
    }

    #[test]
    fn remove_nodes_cascades_edges() {
        let mut store = populated();
        assert_eq!(store.remove_nodes(&[id("h"), id("missing")]), 1);
        assert_eq!(store.current().nodes.len(), 2);
        assert!(store.current().edges.is_empty());
    }

    #[test]
    fn add_edge_goes_through_connection_rules() {
        let mut store = populated();
        let err = store.add_edge(Edge::new(id("t"), id("e"))).unwrap_err();
        assert!(matches!(
            err,
            GraphError::ConnectionRejected {
                reason: ConnectionRejection::OutputOccupied,
                ..
            }
        ));
    }

    #[test]
    fn shrinking_switch_rules_drops_orphaned_branches() {
        let mut store = GraphStore::new();
        store.add_node(node("sw", NodeKind::Switch)).unwrap();
        store.add_node(node("a", NodeKind::Http)).unwrap();
        store.add_node(node("b", NodeKind::Http)).unwrap();
        store
            .add_edge(Edge::new(id("sw"), id("a")).from_handle("rule-1"))
            .unwrap();
        store
            .add_edge(Edge::new(id("sw"), id("b")).from_handle("fallback"))
            .unwrap();

        store
            .update_node_data(&id("sw"), json!({ "rules": [{}] }))
            .unwrap();

        let edges = &store.current().edges;
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source_handle(), Some("fallback"));
    }

    #[test]
    fn set_positions_ignores_unknown_nodes() {
        let mut store = populated();
        let moved = store.set_positions([
            (id("t"), Position::new(5.0, 6.0)),
            (id("ghost"), Position::new(1.0, 1.0)),
        ]);
        assert_eq!(moved, 1);
        assert_eq!(store.current().node(&id("t")).unwrap().position, Position::new(5.0, 6.0));
    }

    #[test]
    fn selection_operations() {
        let mut store = populated();
        store.select(&id("t"), false);
        store.select(&id("h"), true);
        assert_eq!(store.selected_ids(), vec![id("t"), id("h")]);

        store.select(&id("e"), false);
        assert_eq!(store.selected_ids(), vec![id("e")]);

        store.select_all();
        assert_eq!(store.selected_ids().len(), 3);

        store.select_only(&[id("h")]);
        assert_eq!(store.selected_ids(), vec![id("h")]);

        store.clear_selection();
        assert!(store.selected_ids().is_empty());
    }

    #[test]
    fn insert_subgraph_selects_inserted_nodes() {
        let mut store = populated();
        store.select_all();
        let subgraph = GraphDocument::from_parts(
            vec![node("x", NodeKind::Http), node("y", NodeKind::Email)],
            vec![Edge::new(id("x"), id("y"))],
        );

        let inserted = store.insert_subgraph(subgraph);

        assert_eq!(inserted, vec![id("x"), id("y")]);
        assert_eq!(store.selected_ids(), inserted);
        assert_eq!(store.current().edges.len(), 3);
    }
}
