//! Edge highlighting driven by execution state.
//!
//! An edge takes the look of its target node: animated while the target
//! runs, statically highlighted once the target has been reached. Nothing
//! is animated after the workflow finishes.

use crate::state::ExecutionState;
use crate::telemetry::NodeStatus;
use flowcanvas_graph::{Edge, EdgeStyle, GraphStore};

/// How the execution overlay draws an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOverlay {
    Plain,
    Animated,
    Highlighted,
}

/// Returns the overlay for an edge entering a node with `target_status`.
#[must_use]
pub fn edge_overlay(state: &ExecutionState, target_status: NodeStatus) -> EdgeOverlay {
    match target_status {
        NodeStatus::Running if !state.status.is_terminal() => EdgeOverlay::Animated,
        status if status.has_reached() => EdgeOverlay::Highlighted,
        _ => EdgeOverlay::Plain,
    }
}

/// Restyles every edge in `store` for `state`.
///
/// Only overlay fields are touched; this is not a structural change and
/// does not belong in undo history. Returns the number of edges changed.
pub fn apply_edge_highlighting(state: &ExecutionState, store: &mut GraphStore) -> usize {
    let mut changed = 0;
    store.for_each_edge_mut(|edge| {
        let overlay = edge_overlay(state, state.node_status(&edge.target));
        if set_overlay(edge, overlay) {
            changed += 1;
        }
    });
    changed
}

/// Removes every overlay from `store`.
pub fn clear_edge_highlighting(store: &mut GraphStore) {
    store.for_each_edge_mut(Edge::strip_execution_style);
}

fn set_overlay(edge: &mut Edge, overlay: EdgeOverlay) -> bool {
    let animated = overlay == EdgeOverlay::Animated;
    let highlighted = overlay == EdgeOverlay::Highlighted;
    let was_highlighted = edge.style.as_ref().is_some_and(|s| s.highlighted);
    if edge.animated == animated && was_highlighted == highlighted {
        return false;
    }

    edge.animated = animated;
    if highlighted {
        edge.style.get_or_insert_with(EdgeStyle::default).highlighted = true;
    } else if let Some(style) = edge.style.as_mut() {
        style.highlighted = false;
        if style.is_empty() {
            edge.style = None;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ExecutionAction, ExecutionStore};
    use flowcanvas_core::{ExecutionId, NodeId, WorkflowId};
    use flowcanvas_graph::{Node, NodeKind, Position};
    use serde_json::json;

    fn id(s: &str) -> NodeId {
        NodeId::new(s)
    }

    fn graph_store() -> GraphStore {
        let mut store = GraphStore::new();
        for (node_id, kind) in [("t", NodeKind::Trigger), ("a", NodeKind::Http), ("b", NodeKind::Email)] {
            store
                .add_node(Node::with_id(id(node_id), kind, Position::default()))
                .unwrap();
        }
        store.add_edge(Edge::new(id("t"), id("a"))).unwrap();
        store.add_edge(Edge::new(id("a"), id("b"))).unwrap();
        store
    }

    fn update(store: &mut ExecutionStore, value: serde_json::Value) {
        store.dispatch(ExecutionAction::NodeUpdate(serde_json::from_value(value).unwrap()));
    }

    fn overlays(store: &GraphStore) -> Vec<(bool, bool)> {
        store
            .current()
            .edges
            .iter()
            .map(|e| (e.animated, e.style.as_ref().is_some_and(|s| s.highlighted)))
            .collect()
    }

    #[test]
    fn running_target_animates_and_finished_target_highlights() {
        let mut graph = graph_store();
        let mut execution = ExecutionStore::new();
        execution.dispatch(ExecutionAction::StartExecution {
            execution_id: ExecutionId::new("exec_1"),
            workflow_id: WorkflowId::new(1),
        });
        update(&mut execution, json!({ "node_id": "a", "status": "success" }));
        update(&mut execution, json!({ "node_id": "b", "status": "running" }));

        assert_eq!(apply_edge_highlighting(execution.current(), &mut graph), 2);
        assert_eq!(overlays(&graph), vec![(false, true), (true, false)]);

        // Reapplying the same state is a no-op.
        assert_eq!(apply_edge_highlighting(execution.current(), &mut graph), 0);
    }

    #[test]
    fn terminal_workflow_stops_animation() {
        let mut graph = graph_store();
        let mut execution = ExecutionStore::new();
        execution.dispatch(ExecutionAction::StartExecution {
            execution_id: ExecutionId::new("exec_1"),
            workflow_id: WorkflowId::new(1),
        });
        update(&mut execution, json!({ "node_id": "b", "status": "running" }));
        apply_edge_highlighting(execution.current(), &mut graph);

        execution.dispatch(ExecutionAction::Halt);
        apply_edge_highlighting(execution.current(), &mut graph);
        assert!(graph.current().edges.iter().all(|e| !e.animated));
    }

    #[test]
    fn clearing_removes_overlay_but_keeps_branch_color() {
        let mut graph = graph_store();
        graph.for_each_edge_mut(|edge| {
            edge.style = Some(EdgeStyle {
                stroke: Some("#22c55e".to_string()),
                highlighted: true,
                ..EdgeStyle::default()
            });
            edge.animated = true;
        });

        clear_edge_highlighting(&mut graph);

        for edge in &graph.current().edges {
            assert!(!edge.animated);
            let style = edge.style.as_ref().unwrap();
            assert!(!style.highlighted);
            assert_eq!(style.stroke.as_deref(), Some("#22c55e"));
        }
    }
}
