//! Edge types for canvas graphs.
//!
//! An edge connects a source node's output handle to a target node. The
//! `animated` flag and [`EdgeStyle::highlighted`] are transient execution
//! overlay state; they are stripped before an edge leaves the canvas.

use crate::node::{FALSE_HANDLE, TRUE_HANDLE};
use flowcanvas_core::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};

/// Stroke color applied to legacy `true` branches.
pub const TRUE_BRANCH_COLOR: &str = "#22c55e";

/// Stroke color applied to legacy `false` branches.
pub const FALSE_BRANCH_COLOR: &str = "#ef4444";

fn is_false(value: &bool) -> bool {
    !*value
}

/// Visual style of an edge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    /// Stroke color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    /// Stroke width in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    /// Statically highlighted by the execution overlay.
    #[serde(default, skip_serializing_if = "is_false")]
    pub highlighted: bool,
}

impl EdgeStyle {
    /// Returns true if the style carries nothing worth keeping.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stroke.is_none() && self.stroke_width.is_none() && !self.highlighted
    }
}

/// A directed edge between two canvas nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Unique identifier for this edge.
    pub id: EdgeId,
    /// The node the edge leaves.
    pub source: NodeId,
    /// The node the edge enters.
    pub target: NodeId,
    /// The output handle on the source node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// The input handle on the target node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    /// Text drawn along the edge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Visual style.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<EdgeStyle>,
    /// Animated by the execution overlay.
    #[serde(default, skip_serializing_if = "is_false")]
    pub animated: bool,
}

impl Edge {
    /// Creates an edge with a fresh ID from a node's default output.
    #[must_use]
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            id: EdgeId::generate(),
            source,
            target,
            source_handle: None,
            target_handle: None,
            label: None,
            style: None,
            animated: false,
        }
    }

    /// Sets the source handle.
    #[must_use]
    pub fn from_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    /// Sets the target handle.
    #[must_use]
    pub fn to_handle(mut self, handle: impl Into<String>) -> Self {
        self.target_handle = Some(handle.into());
        self
    }

    /// Returns the source handle as a string slice.
    #[must_use]
    pub fn source_handle(&self) -> Option<&str> {
        self.source_handle.as_deref()
    }

    /// Returns true if the edge leaves a boolean branch handle.
    #[must_use]
    pub fn is_boolean_branch(&self) -> bool {
        matches!(self.source_handle(), Some(TRUE_HANDLE) | Some(FALSE_HANDLE))
    }

    /// Fills in the default label and color of a boolean branch edge.
    ///
    /// Existing label or stroke values are kept.
    pub fn apply_branch_defaults(&mut self) {
        let (label, color) = match self.source_handle() {
            Some(TRUE_HANDLE) => ("True", TRUE_BRANCH_COLOR),
            Some(FALSE_HANDLE) => ("False", FALSE_BRANCH_COLOR),
            _ => return,
        };
        if self.label.is_none() {
            self.label = Some(label.to_string());
        }
        let style = self.style.get_or_insert_with(EdgeStyle::default);
        if style.stroke.is_none() {
            style.stroke = Some(color.to_string());
        }
    }

    /// Removes execution overlay state from the edge.
    pub fn strip_execution_style(&mut self) {
        self.animated = false;
        if let Some(style) = self.style.as_mut() {
            style.highlighted = false;
            if style.is_empty() {
                self.style = None;
            }
        }
    }
}
