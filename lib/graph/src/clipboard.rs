//! Clipboard payloads.
//!
//! Copying produces a tagged selection envelope:
//!
//! ```json
//! { "markerType": "selection", "nodes": [...], "edges": [...] }
//! ```
//!
//! Pasting decodes whatever text is on the clipboard. Tagged selections are
//! inserted alongside the existing graph with fresh IDs; untagged payloads
//! are whole-graph imports and only count if they contain at least one
//! recognized node, so pasting unrelated text never clears the canvas.

use crate::codec::{normalize_format, sanitize_graph};
use crate::edge::Edge;
use crate::error::CodecError;
use crate::graph::GraphDocument;
use crate::node::Node;
use flowcanvas_core::{EdgeId, NodeId};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Value of `markerType` on copied selections.
pub const SELECTION_MARKER: &str = "selection";

/// Distance, on both axes, between pasted nodes and their originals.
pub const PASTE_OFFSET: f64 = 32.0;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectionEnvelope {
    marker_type: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

/// What a clipboard text decodes to.
#[derive(Debug, Clone, PartialEq)]
pub enum PastePayload {
    /// A copied selection, to be remapped and inserted.
    Selection(GraphDocument),
    /// A whole graph, to replace the canvas.
    Graph(GraphDocument),
    /// Nothing usable.
    Ignored,
}

/// Serializes the selected subgraph as a selection envelope.
///
/// With no selected nodes, the inspector-focused node is copied instead.
/// Only edges with both endpoints in the copied set are kept, and
/// execution overlay styling is stripped. Returns `None` when there is
/// nothing to copy.
///
/// # Errors
///
/// Returns an error if the envelope cannot be serialized.
pub fn copy_selection(
    graph: &GraphDocument,
    inspector_focus: Option<&NodeId>,
) -> Result<Option<String>, Report<CodecError>> {
    let mut nodes: Vec<Node> = graph.selected_nodes().cloned().collect();
    if nodes.is_empty() {
        nodes.extend(inspector_focus.and_then(|id| graph.node(id)).cloned());
    }
    if nodes.is_empty() {
        return Ok(None);
    }
    for node in &mut nodes {
        node.selected = false;
    }

    let copied: HashSet<&NodeId> = nodes.iter().map(|n| &n.id).collect();
    let edges: Vec<Edge> = graph
        .edges
        .iter()
        .filter(|e| copied.contains(&e.source) && copied.contains(&e.target))
        .cloned()
        .map(|mut e| {
            e.strip_execution_style();
            e
        })
        .collect();

    let envelope = SelectionEnvelope {
        marker_type: SELECTION_MARKER.to_string(),
        nodes,
        edges,
    };
    let text = serde_json::to_string(&envelope).map_err(|e| CodecError::Serialize {
        details: e.to_string(),
    })?;
    Ok(Some(text))
}

/// Decodes clipboard text.
///
/// Never fails: anything unusable decodes to [`PastePayload::Ignored`].
#[must_use]
pub fn decode_clipboard(text: &str) -> PastePayload {
    let raw: JsonValue = match serde_json::from_str(text) {
        Ok(raw) => raw,
        Err(e) => {
            debug!(error = %e, "Ignoring non-JSON clipboard payload");
            return PastePayload::Ignored;
        }
    };
    if !raw.is_object() {
        debug!("Ignoring clipboard payload that is not an object");
        return PastePayload::Ignored;
    }

    let is_selection = raw.get("markerType").and_then(JsonValue::as_str) == Some(SELECTION_MARKER);
    let graph = if is_selection {
        sanitize_graph(&raw)
    } else {
        sanitize_graph(&normalize_format(raw))
    };

    match (graph.is_empty(), is_selection) {
        (true, _) => {
            debug!("Ignoring clipboard payload without recognized nodes");
            PastePayload::Ignored
        }
        (false, true) => PastePayload::Selection(graph),
        (false, false) => PastePayload::Graph(graph),
    }
}

/// Gives a copied selection fresh identities.
///
/// Every node gets a new ID and is moved by `offset` on both axes. Edges
/// are rewritten through the old-to-new ID map and get new IDs; edges with
/// an endpoint outside the selection are dropped. The returned nodes are
/// marked selected.
#[must_use]
pub fn remap_selection(selection: GraphDocument, offset: f64) -> GraphDocument {
    let mut id_map: HashMap<NodeId, NodeId> = HashMap::with_capacity(selection.nodes.len());
    let nodes: Vec<Node> = selection
        .nodes
        .into_iter()
        .map(|mut node| {
            let fresh = NodeId::generate();
            id_map.insert(node.id.clone(), fresh.clone());
            node.id = fresh;
            node.position = node.position.offset(offset, offset);
            node.selected = true;
            node
        })
        .collect();

    let edges: Vec<Edge> = selection
        .edges
        .into_iter()
        .filter_map(|mut edge| {
            edge.source = id_map.get(&edge.source)?.clone();
            edge.target = id_map.get(&edge.target)?.clone();
            edge.id = EdgeId::generate();
            edge.strip_execution_style();
            Some(edge)
        })
        .collect();

    GraphDocument::from_parts(nodes, edges)
}
