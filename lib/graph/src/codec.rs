//! Serialization of canvas graphs.
//!
//! The canonical wire shape is `{ "nodes": [...], "edges": [...] }`, the
//! serde form of [`GraphDocument`]. Untrusted input (clipboard text, files,
//! templates, assistant output) always goes through [`sanitize_graph`],
//! which keeps what it recognizes and drops the rest.
//!
//! A foreign export format is also accepted. Its edges use `src`/`dst`
//! instead of `source`/`target` and its nodes carry flat `x`/`y`
//! coordinates; it is detected structurally and rewritten to the canonical
//! shape before sanitization.

use crate::edge::Edge;
use crate::error::CodecError;
use crate::graph::GraphDocument;
use crate::node::{Node, NodeKind};
use rootcause::prelude::Report;
use serde_json::{Map, Value as JsonValue, json};
use std::collections::HashSet;
use tracing::debug;

/// Serializes a graph to pretty-printed canonical JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn stringify_graph(graph: &GraphDocument) -> Result<String, Report<CodecError>> {
    let text = serde_json::to_string_pretty(graph).map_err(|e| CodecError::Serialize {
        details: e.to_string(),
    })?;
    Ok(text)
}

/// Parses graph JSON in the canonical or foreign format.
///
/// This is the strict entry point used for explicit imports: anything that
/// yields no usable node is an error the caller should surface.
///
/// # Errors
///
/// Returns an error if the text is not JSON, is not a JSON object, or
/// contains no recognized nodes.
pub fn parse_graph(text: &str) -> Result<GraphDocument, Report<CodecError>> {
    let raw: JsonValue = serde_json::from_str(text).map_err(|e| CodecError::InvalidJson {
        details: e.to_string(),
    })?;
    if !raw.is_object() {
        return Err(CodecError::UnexpectedShape {
            details: format!("expected an object, found {}", json_type_name(&raw)),
        }
        .into());
    }

    let graph = sanitize_graph(&normalize_format(raw));
    if graph.is_empty() {
        return Err(CodecError::NoRecognizedNodes.into());
    }
    Ok(graph)
}

/// Rewrites foreign-format JSON into the canonical shape.
///
/// Canonical input is returned unchanged.
#[must_use]
pub fn normalize_format(raw: JsonValue) -> JsonValue {
    if is_foreign_format(&raw) {
        debug!("Translating foreign graph format");
        translate_foreign(&raw)
    } else {
        raw
    }
}

/// Keeps the recognizable part of a raw graph.
///
/// - Nodes with an unknown kind, a missing ID or a duplicate ID are dropped
/// - Edges whose endpoints are not both present are dropped
/// - Boolean `sourceHandle` values become the `"true"`/`"false"` handles
/// - Boolean branch edges get their default label and color
#[must_use]
pub fn sanitize_graph(raw: &JsonValue) -> GraphDocument {
    let mut nodes: Vec<Node> = Vec::new();
    let mut node_ids = HashSet::new();

    for raw_node in array_field(raw, "nodes") {
        let Some(node) = sanitize_node(raw_node) else {
            continue;
        };
        if !node_ids.insert(node.id.clone()) {
            debug!(node_id = %node.id, "Dropping duplicate node");
            continue;
        }
        nodes.push(node);
    }

    let mut edges: Vec<Edge> = Vec::new();
    let mut edge_ids = HashSet::new();
    for raw_edge in array_field(raw, "edges") {
        let Some(mut edge) = sanitize_edge(raw_edge) else {
            continue;
        };
        if !node_ids.contains(&edge.source) || !node_ids.contains(&edge.target) {
            debug!(edge_id = %edge.id, source = %edge.source, target = %edge.target, "Dropping edge with missing endpoint");
            continue;
        }
        if !edge_ids.insert(edge.id.clone()) {
            debug!(edge_id = %edge.id, "Dropping duplicate edge");
            continue;
        }
        edge.apply_branch_defaults();
        edges.push(edge);
    }

    GraphDocument::from_parts(nodes, edges)
}

fn sanitize_node(raw: &JsonValue) -> Option<Node> {
    let object = raw.as_object()?;
    let kind_name = object.get("type").and_then(JsonValue::as_str).unwrap_or_default();
    let kind: NodeKind = match kind_name.parse() {
        Ok(kind) => kind,
        Err(e) => {
            debug!(error = %e, "Dropping node with unregistered kind");
            return None;
        }
    };

    let mut object = object.clone();
    object.insert("type".to_string(), JsonValue::from(kind.as_str()));
    match serde_json::from_value::<Node>(JsonValue::Object(object)) {
        Ok(node) if !node.id.as_str().trim().is_empty() => Some(node),
        Ok(_) => {
            debug!("Dropping node with empty id");
            None
        }
        Err(e) => {
            debug!(error = %e, "Dropping malformed node");
            None
        }
    }
}

fn sanitize_edge(raw: &JsonValue) -> Option<Edge> {
    let mut object = raw.as_object()?.clone();

    if let Some(JsonValue::Bool(b)) = object.get("sourceHandle") {
        let handle = b.to_string();
        object.insert("sourceHandle".to_string(), JsonValue::from(handle));
    }
    if !object.get("id").is_some_and(JsonValue::is_string) {
        let id = derived_edge_id(&object)?;
        object.insert("id".to_string(), JsonValue::from(id));
    }

    match serde_json::from_value::<Edge>(JsonValue::Object(object)) {
        Ok(edge) => Some(edge),
        Err(e) => {
            debug!(error = %e, "Dropping malformed edge");
            None
        }
    }
}

/// Derives a stable ID for an edge that arrived without one.
fn derived_edge_id(object: &Map<String, JsonValue>) -> Option<String> {
    let source = object.get("source")?.as_str()?;
    let target = object.get("target")?.as_str()?;
    let handle = object
        .get("sourceHandle")
        .and_then(JsonValue::as_str)
        .unwrap_or("out");
    Some(format!("edge_{source}_{handle}_{target}"))
}

fn array_field<'a>(raw: &'a JsonValue, field: &'static str) -> impl Iterator<Item = &'a JsonValue> + 'a {
    raw.get(field)
        .and_then(JsonValue::as_array)
        .into_iter()
        .flatten()
}

fn is_foreign_format(raw: &JsonValue) -> bool {
    let foreign_edge = array_field(raw, "edges").any(|e| {
        (e.get("src").is_some() || e.get("dst").is_some()) && e.get("source").is_none()
    });
    let foreign_node = array_field(raw, "nodes")
        .any(|n| n.get("position").is_none() && (n.get("x").is_some() || n.get("y").is_some()));
    foreign_edge || foreign_node
}

fn translate_foreign(raw: &JsonValue) -> JsonValue {
    let nodes: Vec<JsonValue> = array_field(raw, "nodes")
        .map(|n| {
            let kind = n.get("type").or_else(|| n.get("kind")).cloned();
            let data = ["data", "config", "params"]
                .iter()
                .find_map(|key| n.get(*key).filter(|v| v.is_object()))
                .cloned()
                .unwrap_or_else(|| json!({}));
            let position = n.get("position").cloned().unwrap_or_else(|| {
                json!({
                    "x": n.get("x").and_then(JsonValue::as_f64).unwrap_or(0.0),
                    "y": n.get("y").and_then(JsonValue::as_f64).unwrap_or(0.0),
                })
            });
            json!({
                "id": foreign_id(n.get("id")),
                "type": kind.unwrap_or(JsonValue::Null),
                "position": position,
                "data": data,
            })
        })
        .collect();

    let edges: Vec<JsonValue> = array_field(raw, "edges")
        .map(|e| {
            let source = foreign_id(e.get("source").or_else(|| e.get("src")));
            let target = foreign_id(e.get("target").or_else(|| e.get("dst")));
            let handle = ["sourceHandle", "src_port", "port", "handle"]
                .iter()
                .find_map(|key| e.get(*key).filter(|v| !v.is_null()))
                .cloned();

            let mut edge = Map::new();
            if let Some(id) = e.get("id").filter(|v| v.is_string()) {
                edge.insert("id".to_string(), id.clone());
            }
            edge.insert("source".to_string(), source);
            edge.insert("target".to_string(), target);
            if let Some(handle) = handle {
                edge.insert("sourceHandle".to_string(), handle);
            }
            if let Some(label) = e.get("label").filter(|v| v.is_string()) {
                edge.insert("label".to_string(), label.clone());
            }
            JsonValue::Object(edge)
        })
        .collect();

    json!({ "nodes": nodes, "edges": edges })
}

/// Foreign exports may use numeric IDs; canonical IDs are strings.
fn foreign_id(value: Option<&JsonValue>) -> JsonValue {
    match value {
        Some(JsonValue::Number(n)) => JsonValue::from(n.to_string()),
        Some(v) => v.clone(),
        None => JsonValue::Null,
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
