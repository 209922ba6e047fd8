//! Telemetry wire format.
//!
//! The executor streams JSON objects, one per frame:
//!
//! ```json
//! { "node_id": "node_01H...", "status": "success", "output": { "ok": true } }
//! ```
//!
//! Every field is optional. A message with a `status` but no `node_id`
//! reports the status of the workflow as a whole.

use flowcanvas_core::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Execution status of a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Idle,
    Running,
    Success,
    Failed,
    Waiting,
}

impl NodeStatus {
    /// Maps a wire status, case-insensitively. Unknown strings are idle.
    #[must_use]
    pub fn from_wire(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "running" => Self::Running,
            "success" | "completed" => Self::Success,
            "failed" | "error" => Self::Failed,
            "waiting" | "pending" => Self::Waiting,
            _ => Self::Idle,
        }
    }

    /// Returns true if the node has finished.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Returns true if the node has run or is parked.
    ///
    /// These are the statuses whose incoming edges are highlighted.
    #[must_use]
    pub fn has_reached(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Waiting)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Waiting => "waiting",
        };
        f.write_str(s)
    }
}

/// Status of a workflow execution as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
    Halted,
}

impl WorkflowStatus {
    /// Maps a wire status, case-insensitively. Unknown strings are idle.
    #[must_use]
    pub fn from_wire(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "running" => Self::Running,
            "success" | "completed" => Self::Completed,
            "failed" | "error" => Self::Failed,
            "halted" | "cancelled" | "canceled" | "stopped" => Self::Halted,
            _ => Self::Idle,
        }
    }

    /// Returns true if the workflow has finished.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Halted)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Halted => "halted",
        };
        f.write_str(s)
    }
}

/// One telemetry event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetryMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineage_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
}

impl TelemetryMessage {
    /// Parses one frame.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the frame is not a telemetry object.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Returns the workflow status if this is a workflow-level message.
    #[must_use]
    pub fn workflow_status(&self) -> Option<WorkflowStatus> {
        match (&self.node_id, &self.status) {
            (None, Some(status)) => Some(WorkflowStatus::from_wire(status)),
            _ => None,
        }
    }

    /// Returns the node status carried by a node-level message.
    #[must_use]
    pub fn node_status(&self) -> Option<NodeStatus> {
        self.node_id.as_ref()?;
        self.status.as_deref().map(NodeStatus::from_wire)
    }

    /// Returns true if this message ends the workflow.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.workflow_status().is_some_and(|s| s.is_terminal())
    }

    /// Returns the fan-out lineage carried by the message, if any.
    #[must_use]
    pub fn lineage(&self) -> Option<Lineage> {
        let lineage = Lineage {
            hash: self.lineage_hash.clone(),
            branch_id: self.branch_id.clone(),
            item_index: self.item_index,
            total_items: self.total_items,
        };
        (!lineage.is_empty()).then_some(lineage)
    }
}

/// Identifies one of several executions of a node under fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lineage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
}

impl Lineage {
    fn is_empty(&self) -> bool {
        self.hash.is_none()
            && self.branch_id.is_none()
            && self.item_index.is_none()
            && self.total_items.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_status_mapping_is_case_insensitive() {
        assert_eq!(NodeStatus::from_wire("RUNNING"), NodeStatus::Running);
        assert_eq!(NodeStatus::from_wire("Completed"), NodeStatus::Success);
        assert_eq!(NodeStatus::from_wire("error"), NodeStatus::Failed);
        assert_eq!(NodeStatus::from_wire("Pending"), NodeStatus::Waiting);
        assert_eq!(NodeStatus::from_wire("bogus"), NodeStatus::Idle);
    }

    #[test]
    fn workflow_status_mapping() {
        assert_eq!(WorkflowStatus::from_wire("completed"), WorkflowStatus::Completed);
        assert_eq!(WorkflowStatus::from_wire("SUCCESS"), WorkflowStatus::Completed);
        assert_eq!(WorkflowStatus::from_wire("failed"), WorkflowStatus::Failed);
        assert_eq!(WorkflowStatus::from_wire("Cancelled"), WorkflowStatus::Halted);
        assert_eq!(WorkflowStatus::from_wire("waiting"), WorkflowStatus::Idle);
    }

    #[test]
    fn message_without_node_id_is_workflow_level() {
        let msg = TelemetryMessage::parse(r#"{"status":"completed"}"#).unwrap();
        assert_eq!(msg.workflow_status(), Some(WorkflowStatus::Completed));
        assert!(msg.node_status().is_none());
        assert!(msg.is_terminal());

        let msg = TelemetryMessage::parse(r#"{"node_id":"a","status":"running"}"#).unwrap();
        assert!(msg.workflow_status().is_none());
        assert_eq!(msg.node_status(), Some(NodeStatus::Running));
        assert!(!msg.is_terminal());
    }

    #[test]
    fn lineage_is_collected_from_flat_fields() {
        let msg = TelemetryMessage::parse(
            r#"{"node_id":"a","status":"running","branch_id":"b1","item_index":2,"total_items":5}"#,
        )
        .unwrap();
        let lineage = msg.lineage().unwrap();
        assert_eq!(lineage.branch_id.as_deref(), Some("b1"));
        assert_eq!(lineage.item_index, Some(2));
        assert_eq!(lineage.total_items, Some(5));

        let msg = TelemetryMessage::parse(r#"{"node_id":"a"}"#).unwrap();
        assert!(msg.lineage().is_none());
    }

    #[test]
    fn parse_rejects_non_objects() {
        assert!(TelemetryMessage::parse("[]").is_err());
        assert!(TelemetryMessage::parse("ping").is_err());
    }
}
