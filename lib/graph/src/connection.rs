//! Connection rules for new edges.
//!
//! The downstream executor assumes every output handle drives at most one
//! successor, so the rules here enforce a cardinality of one per handle
//! (or one in total for single-output kinds).

use crate::graph::GraphDocument;
use crate::node::HandleSchema;
use flowcanvas_core::NodeId;
use std::fmt;

/// Why a candidate edge was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionRejection {
    /// The edge would connect a node to itself.
    SelfLoop,
    /// The source node does not exist.
    MissingSource,
    /// The target node does not exist.
    MissingTarget,
    /// The target kind takes no inputs.
    TargetTakesNoInput,
    /// The source handle is absent or not declared by the source node.
    UnknownHandle { handle: Option<String> },
    /// The source handle already drives another node.
    HandleOccupied { handle: String },
    /// The single default output already drives another node.
    OutputOccupied,
}

impl fmt::Display for ConnectionRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfLoop => write!(f, "a node cannot connect to itself"),
            Self::MissingSource => write!(f, "source node does not exist"),
            Self::MissingTarget => write!(f, "target node does not exist"),
            Self::TargetTakesNoInput => write!(f, "target node takes no input"),
            Self::UnknownHandle { handle: Some(h) } => write!(f, "unknown source handle '{h}'"),
            Self::UnknownHandle { handle: None } => write!(f, "source handle is required"),
            Self::HandleOccupied { handle } => write!(f, "handle '{handle}' is already connected"),
            Self::OutputOccupied => write!(f, "output is already connected"),
        }
    }
}

/// Decides whether the edge `source --source_handle--> target` may be added.
///
/// # Errors
///
/// Returns the first rule the candidate violates.
pub fn validate_connection(
    graph: &GraphDocument,
    source: &NodeId,
    target: &NodeId,
    source_handle: Option<&str>,
) -> Result<(), ConnectionRejection> {
    if source == target {
        return Err(ConnectionRejection::SelfLoop);
    }

    let source_node = graph
        .node(source)
        .ok_or(ConnectionRejection::MissingSource)?;
    let target_node = graph
        .node(target)
        .ok_or(ConnectionRejection::MissingTarget)?;

    if !target_node.kind.accepts_input() {
        return Err(ConnectionRejection::TargetTakesNoInput);
    }

    match source_node.handle_schema() {
        schema @ (HandleSchema::Binary | HandleSchema::Dynamic(_)) => {
            if !schema.contains(source_handle) {
                return Err(ConnectionRejection::UnknownHandle {
                    handle: source_handle.map(str::to_string),
                });
            }
            let occupied = graph
                .outgoing(source)
                .any(|edge| edge.source_handle() == source_handle);
            match (occupied, source_handle) {
                (true, Some(handle)) => Err(ConnectionRejection::HandleOccupied {
                    handle: handle.to_string(),
                }),
                _ => Ok(()),
            }
        }
        HandleSchema::Single => {
            if graph.outgoing(source).next().is_some() {
                Err(ConnectionRejection::OutputOccupied)
            } else {
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;
    use crate::node::{Node, NodeKind, Position};
    use serde_json::json;

    fn node(id: &str, kind: NodeKind) -> Node {
        Node::with_id(NodeId::new(id), kind, Position::default())
    }

    fn id(s: &str) -> NodeId {
        NodeId::new(s)
    }

    fn graph(nodes: Vec<Node>, edges: Vec<Edge>) -> GraphDocument {
        GraphDocument::from_parts(nodes, edges)
    }

    #[test]
    fn rejects_self_loop() {
        let g = graph(vec![node("a", NodeKind::Http)], vec![]);
        assert_eq!(
            validate_connection(&g, &id("a"), &id("a"), None),
            Err(ConnectionRejection::SelfLoop)
        );
    }

    #[test]
    fn rejects_missing_endpoints() {
        let g = graph(vec![node("a", NodeKind::Http)], vec![]);
        assert_eq!(
            validate_connection(&g, &id("x"), &id("a"), None),
            Err(ConnectionRejection::MissingSource)
        );
        assert_eq!(
            validate_connection(&g, &id("a"), &id("x"), None),
            Err(ConnectionRejection::MissingTarget)
        );
    }

    #[test]
    fn rejects_edges_into_triggers() {
        let g = graph(
            vec![node("a", NodeKind::Http), node("t", NodeKind::Trigger)],
            vec![],
        );
        assert_eq!(
            validate_connection(&g, &id("a"), &id("t"), None),
            Err(ConnectionRejection::TargetTakesNoInput)
        );
    }

    #[test]
    fn plain_node_allows_one_outgoing_edge() {
        let g = graph(
            vec![
                node("a", NodeKind::Http),
                node("b", NodeKind::Email),
                node("c", NodeKind::Transform),
            ],
            vec![],
        );
        assert!(validate_connection(&g, &id("a"), &id("b"), None).is_ok());

        let g = graph(g.nodes, vec![Edge::new(id("a"), id("b"))]);
        assert_eq!(
            validate_connection(&g, &id("a"), &id("c"), None),
            Err(ConnectionRejection::OutputOccupied)
        );
        assert_eq!(
            validate_connection(&g, &id("a"), &id("b"), Some("output")),
            Err(ConnectionRejection::OutputOccupied)
        );
    }

    #[test]
    fn conditional_allows_one_edge_per_branch() {
        let nodes = vec![
            node("if", NodeKind::Conditional),
            node("b", NodeKind::Http),
            node("c", NodeKind::Email),
            node("d", NodeKind::Delay),
        ];
        let g = graph(
            nodes.clone(),
            vec![Edge::new(id("if"), id("b")).from_handle("true")],
        );
        assert!(validate_connection(&g, &id("if"), &id("c"), Some("false")).is_ok());
        assert_eq!(
            validate_connection(&g, &id("if"), &id("c"), Some("true")),
            Err(ConnectionRejection::HandleOccupied {
                handle: "true".to_string()
            })
        );

        let g = graph(
            nodes,
            vec![
                Edge::new(id("if"), id("b")).from_handle("true"),
                Edge::new(id("if"), id("c")).from_handle("false"),
            ],
        );
        for handle in ["true", "false"] {
            assert!(validate_connection(&g, &id("if"), &id("d"), Some(handle)).is_err());
        }
    }

    #[test]
    fn conditional_requires_declared_handle() {
        let g = graph(
            vec![node("if", NodeKind::Conditional), node("b", NodeKind::Http)],
            vec![],
        );
        assert_eq!(
            validate_connection(&g, &id("if"), &id("b"), None),
            Err(ConnectionRejection::UnknownHandle { handle: None })
        );
        assert!(validate_connection(&g, &id("if"), &id("b"), Some("maybe")).is_err());
    }

    #[test]
    fn switch_checks_configured_rules() {
        let switch = node("sw", NodeKind::Switch).with_data(json!({ "rules": [{}, {}] }));
        let g = graph(
            vec![switch, node("b", NodeKind::Http), node("c", NodeKind::Http)],
            vec![Edge::new(id("sw"), id("b")).from_handle("rule-0")],
        );

        assert!(validate_connection(&g, &id("sw"), &id("c"), Some("rule-1")).is_ok());
        assert!(validate_connection(&g, &id("sw"), &id("c"), Some("fallback")).is_ok());
        assert_eq!(
            validate_connection(&g, &id("sw"), &id("c"), Some("rule-2")),
            Err(ConnectionRejection::UnknownHandle {
                handle: Some("rule-2".to_string())
            })
        );
        assert_eq!(
            validate_connection(&g, &id("sw"), &id("c"), Some("rule-0")),
            Err(ConnectionRejection::HandleOccupied {
                handle: "rule-0".to_string()
            })
        );
        assert!(validate_connection(&g, &id("sw"), &id("c"), None).is_err());
    }
}
