//! Canvas node types and the kind registry.
//!
//! Every node has:
//! - A unique ID within the canvas
//! - A kind, which selects its default data, handle schema and size
//! - A position (top-left corner, canvas pixels)
//! - A free-form `data` record whose shape depends on the kind
//!
//! The registry lives on [`NodeKind`] and [`Node`] as exhaustive matches, so
//! adding a kind forces every table below to be updated.

use flowcanvas_core::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::fmt;
use std::str::FromStr;

/// Handle identifier for the `true` branch of a conditional.
pub const TRUE_HANDLE: &str = "true";

/// Handle identifier for the `false` branch of a conditional.
pub const FALSE_HANDLE: &str = "false";

/// Handle identifier for the switch fallback output.
pub const FALLBACK_HANDLE: &str = "fallback";

/// Width shared by every node kind.
pub const NODE_WIDTH: f64 = 240.0;

/// Height of a single-row node.
pub const NODE_HEIGHT: f64 = 64.0;

/// Height of one switch row (header or rule).
const SWITCH_ROW_HEIGHT: f64 = 64.0;

/// Number of inputs a new merge node starts with.
const DEFAULT_MERGE_INPUTS: usize = 2;

/// The kind of a canvas node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Manual or scheduled entry point.
    Trigger,
    /// Entry point fired by an inbound HTTP call.
    Webhook,
    /// Boolean branch with `true`/`false` outputs.
    Conditional,
    /// Multi-case branch with one output per rule plus a fallback.
    Switch,
    /// Fan-in of several branches.
    Merge,
    /// Fan-out of an array into per-item executions.
    Split,
    /// Outbound HTTP request.
    Http,
    /// Email sender.
    Email,
    /// Data transformation expression.
    Transform,
    /// Timed pause.
    Delay,
}

impl NodeKind {
    /// Every registered kind, in palette order.
    pub const ALL: [NodeKind; 10] = [
        Self::Trigger,
        Self::Webhook,
        Self::Conditional,
        Self::Switch,
        Self::Merge,
        Self::Split,
        Self::Http,
        Self::Email,
        Self::Transform,
        Self::Delay,
    ];

    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Webhook => "webhook",
            Self::Conditional => "conditional",
            Self::Switch => "switch",
            Self::Merge => "merge",
            Self::Split => "split",
            Self::Http => "http",
            Self::Email => "email",
            Self::Transform => "transform",
            Self::Delay => "delay",
        }
    }

    /// Returns the label shown for a freshly created node.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Trigger => "Manual Trigger",
            Self::Webhook => "Webhook",
            Self::Conditional => "If",
            Self::Switch => "Switch",
            Self::Merge => "Merge",
            Self::Split => "Split",
            Self::Http => "HTTP Request",
            Self::Email => "Send Email",
            Self::Transform => "Transform",
            Self::Delay => "Delay",
        }
    }

    /// Returns true for entry-point kinds.
    #[must_use]
    pub const fn is_trigger(&self) -> bool {
        matches!(self, Self::Trigger | Self::Webhook)
    }

    /// Returns true if edges may terminate at this kind.
    #[must_use]
    pub const fn accepts_input(&self) -> bool {
        !self.is_trigger()
    }

    /// Returns the initial `data` record for a new node of this kind.
    #[must_use]
    pub fn default_data(&self) -> JsonValue {
        let label = self.label();
        match self {
            Self::Trigger => json!({ "label": label }),
            Self::Webhook => json!({ "label": label, "path": "", "method": "POST" }),
            Self::Conditional => json!({ "label": label, "condition": "" }),
            Self::Switch => json!({
                "label": label,
                "rules": [
                    { "condition": "" },
                    { "condition": "" }
                ]
            }),
            Self::Merge => json!({ "label": label, "inputs": DEFAULT_MERGE_INPUTS }),
            Self::Split => json!({ "label": label, "field": "" }),
            Self::Http => json!({ "label": label, "method": "GET", "url": "", "headers": {} }),
            Self::Email => json!({ "label": label, "to": "", "subject": "", "body": "" }),
            Self::Transform => json!({ "label": label, "expression": "" }),
            Self::Delay => json!({ "label": label, "seconds": 60 }),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no registered node kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown node kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownKind {}

impl FromStr for NodeKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// The set of output handles a node exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleSchema {
    /// A single default output.
    Single,
    /// Exactly the `true` and `false` outputs.
    Binary,
    /// A configured, ordered list of outputs.
    Dynamic(Vec<String>),
}

impl HandleSchema {
    /// Returns true if the schema declares `handle`.
    ///
    /// Single-output nodes accept any handle name, including none.
    #[must_use]
    pub fn contains(&self, handle: Option<&str>) -> bool {
        match self {
            Self::Single => true,
            Self::Binary => matches!(handle, Some(TRUE_HANDLE) | Some(FALSE_HANDLE)),
            Self::Dynamic(handles) => handle.is_some_and(|h| handles.iter().any(|d| d == h)),
        }
    }

    /// Returns true if branches from this schema have a visual priority.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        matches!(self, Self::Binary | Self::Dynamic(_))
    }

    /// Returns the priority of `handle`, lowest first.
    ///
    /// Unknown handles sort after every declared one.
    #[must_use]
    pub fn order_of(&self, handle: Option<&str>) -> usize {
        match (self, handle) {
            (Self::Binary, Some(TRUE_HANDLE)) => 0,
            (Self::Binary, Some(FALSE_HANDLE)) => 1,
            (Self::Dynamic(handles), Some(h)) => handles
                .iter()
                .position(|d| d == h)
                .unwrap_or(usize::MAX),
            _ => usize::MAX,
        }
    }
}

/// Canvas position of a node's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Creates a position.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns this position moved by `(dx, dy)`.
    #[must_use]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Rendered size of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

fn empty_data() -> JsonValue {
    JsonValue::Object(serde_json::Map::new())
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A canvas node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier for this node within the canvas.
    pub id: NodeId,
    /// The kind of this node.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Top-left corner on the canvas.
    #[serde(default)]
    pub position: Position,
    /// Kind-specific configuration.
    #[serde(default = "empty_data")]
    pub data: JsonValue,
    /// Pinned nodes keep their position across auto-layout.
    #[serde(default, skip_serializing_if = "is_false")]
    pub pinned: bool,
    /// Whether the node is part of the current selection.
    #[serde(default, skip_serializing_if = "is_false")]
    pub selected: bool,
}

impl Node {
    /// Creates a node of `kind` with a fresh ID and the kind's default data.
    #[must_use]
    pub fn new(kind: NodeKind, position: Position) -> Self {
        Self::with_id(NodeId::generate(), kind, position)
    }

    /// Creates a node with a specific ID and the kind's default data.
    #[must_use]
    pub fn with_id(id: NodeId, kind: NodeKind, position: Position) -> Self {
        Self {
            id,
            kind,
            position,
            data: kind.default_data(),
            pinned: false,
            selected: false,
        }
    }

    /// Replaces the node's data.
    #[must_use]
    pub fn with_data(mut self, data: JsonValue) -> Self {
        self.data = data;
        self
    }

    /// Marks the node as pinned.
    #[must_use]
    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    /// Returns the node's display label, if it has one.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.data.get("label").and_then(JsonValue::as_str)
    }

    /// Returns the number of configured switch rules.
    ///
    /// Zero for every other kind.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        match self.kind {
            NodeKind::Switch => self
                .data
                .get("rules")
                .and_then(JsonValue::as_array)
                .map_or(0, Vec::len),
            _ => 0,
        }
    }

    /// Returns the number of merge inputs.
    ///
    /// Zero for every other kind.
    #[must_use]
    pub fn merge_inputs(&self) -> usize {
        match self.kind {
            NodeKind::Merge => self
                .data
                .get("inputs")
                .and_then(JsonValue::as_u64)
                .map_or(DEFAULT_MERGE_INPUTS, |n| n as usize),
            _ => 0,
        }
    }

    /// Returns the output handle schema for this node's current data.
    #[must_use]
    pub fn handle_schema(&self) -> HandleSchema {
        match self.kind {
            NodeKind::Conditional => HandleSchema::Binary,
            NodeKind::Switch => {
                let mut handles: Vec<String> =
                    (0..self.rule_count()).map(|i| format!("rule-{i}")).collect();
                handles.push(FALLBACK_HANDLE.to_string());
                HandleSchema::Dynamic(handles)
            }
            NodeKind::Trigger
            | NodeKind::Webhook
            | NodeKind::Merge
            | NodeKind::Split
            | NodeKind::Http
            | NodeKind::Email
            | NodeKind::Transform
            | NodeKind::Delay => HandleSchema::Single,
        }
    }

    /// Returns the input handles this node declares.
    ///
    /// Only merge nodes have named inputs; other kinds take a single anonymous input.
    #[must_use]
    pub fn input_handles(&self) -> Vec<String> {
        (0..self.merge_inputs())
            .map(|i| format!("input-{i}"))
            .collect()
    }

    /// Returns the rendered size of this node.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        let height = match self.kind {
            NodeKind::Switch => {
                SWITCH_ROW_HEIGHT + (self.rule_count() as f64 + 1.0) * SWITCH_ROW_HEIGHT
            }
            NodeKind::Conditional => NODE_HEIGHT * 1.5,
            NodeKind::Merge => NODE_HEIGHT.max(self.merge_inputs() as f64 * 32.0),
            NodeKind::Trigger
            | NodeKind::Webhook
            | NodeKind::Split
            | NodeKind::Http
            | NodeKind::Email
            | NodeKind::Transform
            | NodeKind::Delay => NODE_HEIGHT,
        };
        Dimensions {
            width: NODE_WIDTH,
            height,
        }
    }
}
