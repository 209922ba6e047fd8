//! Error types for the graph crate.
//!
//! - `GraphError`: Store mutations that name missing or duplicate entities
//! - `CodecError`: Malformed or unusable serialized graphs
//!
//! Connection rejections are not errors; see
//! [`ConnectionRejection`](crate::connection::ConnectionRejection).

use crate::connection::ConnectionRejection;
use flowcanvas_core::{EdgeId, NodeId};
use std::fmt;

/// Errors from graph store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Node with the given ID was not found.
    NodeNotFound { node_id: NodeId },
    /// A node with the same ID already exists.
    DuplicateNode { node_id: NodeId },
    /// An edge with the same ID already exists.
    DuplicateEdge { edge_id: EdgeId },
    /// The connection rules refused the edge.
    ConnectionRejected {
        source: NodeId,
        target: NodeId,
        reason: ConnectionRejection,
    },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound { node_id } => write!(f, "node not found: {node_id}"),
            Self::DuplicateNode { node_id } => write!(f, "duplicate node id: {node_id}"),
            Self::DuplicateEdge { edge_id } => write!(f, "duplicate edge id: {edge_id}"),
            Self::ConnectionRejected {
                source,
                target,
                reason,
            } => write!(f, "connection {source} -> {target} rejected: {reason}"),
        }
    }
}

impl std::error::Error for GraphError {}

/// Errors from decoding or encoding serialized graphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The text is not valid JSON.
    InvalidJson { details: String },
    /// The JSON is not shaped like a graph.
    UnexpectedShape { details: String },
    /// Sanitization left no usable node.
    NoRecognizedNodes,
    /// Serializing the graph failed.
    Serialize { details: String },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson { details } => write!(f, "invalid graph JSON: {details}"),
            Self::UnexpectedShape { details } => write!(f, "unexpected graph shape: {details}"),
            Self::NoRecognizedNodes => write!(f, "graph contains no recognized nodes"),
            Self::Serialize { details } => write!(f, "failed to serialize graph: {details}"),
        }
    }
}

impl std::error::Error for CodecError {}
