//! Workflow templates.
//!
//! A template is a named, categorized graph that can be shared. Its
//! `graph` field is exactly the canonical `{nodes, edges}` document.

use crate::codec::sanitize_graph;
use crate::error::CodecError;
use crate::graph::GraphDocument;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A reusable workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    pub graph: GraphDocument,
}

impl Template {
    /// Captures `graph` as a private template.
    ///
    /// Selection and execution overlay state are not part of a template.
    #[must_use]
    pub fn export(name: impl Into<String>, category: impl Into<String>, graph: &GraphDocument) -> Self {
        let mut graph = graph.clone();
        for node in &mut graph.nodes {
            node.selected = false;
        }
        for edge in &mut graph.edges {
            edge.strip_execution_style();
        }
        Self {
            name: name.into(),
            category: category.into(),
            description: None,
            is_public: false,
            graph,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the visibility.
    #[must_use]
    pub fn public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    /// Serializes the template to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, Report<CodecError>> {
        let text = serde_json::to_string_pretty(self).map_err(|e| CodecError::Serialize {
            details: e.to_string(),
        })?;
        Ok(text)
    }

    /// Parses a template, sanitizing its graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a template or its graph has no
    /// recognized nodes.
    pub fn from_json(text: &str) -> Result<Self, Report<CodecError>> {
        let raw: JsonValue = serde_json::from_str(text).map_err(|e| CodecError::InvalidJson {
            details: e.to_string(),
        })?;
        let graph = raw
            .get("graph")
            .map(sanitize_graph)
            .ok_or_else(|| CodecError::UnexpectedShape {
                details: "template has no graph".to_string(),
            })?;
        if graph.is_empty() {
            return Err(CodecError::NoRecognizedNodes.into());
        }

        let header: TemplateHeader = serde_json::from_value(raw).map_err(|e| CodecError::UnexpectedShape {
            details: e.to_string(),
        })?;
        Ok(Self {
            name: header.name,
            category: header.category,
            description: header.description,
            is_public: header.is_public,
            graph,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemplateHeader {
    name: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    is_public: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;
    use crate::node::{Node, NodeKind, Position};
    use flowcanvas_core::NodeId;
    use serde_json::json;

    fn graph() -> GraphDocument {
        let mut trigger = Node::with_id(NodeId::new("t"), NodeKind::Trigger, Position::default());
        trigger.selected = true;
        let http = Node::with_id(NodeId::new("h"), NodeKind::Http, Position::new(300.0, 0.0));
        let mut edge = Edge::new(NodeId::new("t"), NodeId::new("h"));
        edge.animated = true;
        GraphDocument::from_parts(vec![trigger, http], vec![edge])
    }

    #[test]
    fn export_strips_transient_state() {
        let template = Template::export("Ping", "monitoring", &graph());
        assert!(!template.graph.nodes[0].selected);
        assert!(!template.graph.edges[0].animated);
        assert!(!template.is_public);
    }

    #[test]
    fn json_preserves_header_and_graph() {
        let template = Template::export("Ping", "monitoring", &graph())
            .with_description("Checks an endpoint")
            .public(true);

        let text = template.to_json().unwrap();
        let value: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(value["isPublic"], true);
        assert_eq!(value["graph"]["nodes"][1]["type"], "http");

        assert_eq!(Template::from_json(&text).unwrap(), template);
    }

    #[test]
    fn from_json_sanitizes_graph() {
        let text = json!({
            "name": "Mixed",
            "category": "misc",
            "graph": {
                "nodes": [
                    { "id": "a", "type": "http" },
                    { "id": "b", "type": "mystery" }
                ],
                "edges": [{ "id": "e", "source": "a", "target": "b" }]
            }
        })
        .to_string();

        let template = Template::from_json(&text).unwrap();
        assert_eq!(template.graph.nodes.len(), 1);
        assert!(template.graph.edges.is_empty());
    }

    #[test]
    fn from_json_rejects_unusable_templates() {
        assert!(Template::from_json("not json").is_err());
        assert!(Template::from_json(r#"{ "name": "x" }"#).is_err());
        assert!(Template::from_json(r#"{ "name": "x", "graph": { "nodes": [] } }"#).is_err());
        assert!(Template::from_json(r#"{ "graph": { "nodes": [{ "id": "a", "type": "http" }] } }"#).is_err());
    }
}
