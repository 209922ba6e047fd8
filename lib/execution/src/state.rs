//! Execution state and its reducer.
//!
//! The overlay state is only ever changed by dispatching an
//! [`ExecutionAction`] to an [`ExecutionStore`]. Telemetry for a node is a
//! partial update: fields a message omits keep their previous values, and
//! timestamps are only stamped on status transitions, so a duplicated
//! message leaves the state unchanged.

use crate::history::ExecutionHistory;
use crate::telemetry::{Lineage, NodeStatus, TelemetryMessage, WorkflowStatus};
use chrono::{DateTime, Utc};
use flowcanvas_core::{ExecutionId, NodeId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tracing::{debug, info};

/// Everything known about one node's execution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeExecutionData {
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineage: Option<Lineage>,
}

impl NodeExecutionData {
    fn merge(&mut self, message: TelemetryMessage, now: DateTime<Utc>) {
        let previous = self.status;
        if let Some(status) = message.node_status() {
            self.status = status;
        }
        if let Some(lineage) = message.lineage() {
            self.lineage = Some(lineage);
        }
        if message.input.is_some() {
            self.input = message.input;
        }
        if message.params.is_some() {
            self.parameters = message.params;
        }
        if message.output.is_some() {
            self.output = message.output;
        }
        if message.error.is_some() {
            self.error = message.error;
        }
        if message.duration_ms.is_some() {
            self.duration_ms = message.duration_ms;
        }

        if self.status == NodeStatus::Running && self.executed_at.is_none() {
            self.executed_at = Some(now);
        }
        if self.status.is_terminal() && !previous.is_terminal() {
            self.completed_at = Some(now);
            if self.duration_ms.is_none() {
                self.duration_ms = self
                    .executed_at
                    .map(|started| (now - started).num_milliseconds().max(0) as u64);
            }
        }
    }
}

/// The execution overlay for one workflow run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutionState {
    pub execution_id: Option<ExecutionId>,
    pub workflow_id: Option<WorkflowId>,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub nodes: HashMap<NodeId, NodeExecutionData>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Loaded from a past run; never reconnects.
    #[serde(default)]
    pub is_historical: bool,
    /// The transport gave up; a manual retry may resume observation.
    #[serde(default)]
    pub connection_lost: bool,
}

impl ExecutionState {
    /// Returns the execution record of a node.
    #[must_use]
    pub fn node(&self, node_id: &NodeId) -> Option<&NodeExecutionData> {
        self.nodes.get(node_id)
    }

    /// Returns the status of a node, idle if it has not been seen.
    #[must_use]
    pub fn node_status(&self, node_id: &NodeId) -> NodeStatus {
        self.nodes.get(node_id).map_or(NodeStatus::Idle, |n| n.status)
    }

    fn finish(&mut self, status: WorkflowStatus, now: DateTime<Utc>) {
        self.status = status;
        if self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
    }

    fn apply_message(&mut self, message: TelemetryMessage, now: DateTime<Utc>) {
        if let Some(status) = message.workflow_status() {
            if status.is_terminal() {
                if status == WorkflowStatus::Failed && message.error.is_some() {
                    self.error = message.error;
                }
                self.finish(status, now);
            } else {
                self.status = status;
            }
            return;
        }

        let Some(node_id) = message.node_id.clone() else {
            debug!("Ignoring telemetry without node_id or status");
            return;
        };
        self.nodes.entry(node_id).or_default().merge(message, now);
    }

    /// Applies one action.
    pub fn reduce(&mut self, action: ExecutionAction) {
        let now = Utc::now();
        match action {
            ExecutionAction::StartExecution {
                execution_id,
                workflow_id,
            } => {
                info!(execution_id = %execution_id, workflow_id = %workflow_id, "Execution started");
                *self = Self {
                    execution_id: Some(execution_id),
                    workflow_id: Some(workflow_id),
                    status: WorkflowStatus::Running,
                    started_at: Some(now),
                    ..Self::default()
                };
            }
            ExecutionAction::NodeUpdate(message) => self.apply_message(message, now),
            ExecutionAction::BatchUpdate(messages) => {
                for message in messages {
                    self.apply_message(message, now);
                }
            }
            ExecutionAction::Reset => *self = Self::default(),
            ExecutionAction::LoadState(snapshot) => {
                *self = *snapshot;
                self.is_historical = true;
            }
            ExecutionAction::SetError(error) => {
                self.error = Some(error);
                if !self.status.is_terminal() {
                    self.connection_lost = true;
                    self.finish(WorkflowStatus::Failed, now);
                }
            }
            ExecutionAction::Halt => {
                if !self.status.is_terminal() {
                    self.finish(WorkflowStatus::Halted, now);
                }
            }
            ExecutionAction::ResumeObservation => {
                if self.connection_lost {
                    self.connection_lost = false;
                    self.error = None;
                    self.status = WorkflowStatus::Running;
                    self.completed_at = None;
                }
            }
        }
    }
}

/// A change to the execution overlay.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionAction {
    /// A new run began; clears all node records.
    StartExecution {
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
    },
    /// One telemetry message.
    NodeUpdate(TelemetryMessage),
    /// Several telemetry messages applied in order.
    BatchUpdate(Vec<TelemetryMessage>),
    /// Back to idle.
    Reset,
    /// Replace the state with a past run's snapshot.
    LoadState(Box<ExecutionState>),
    /// The transport failed for good.
    SetError(String),
    /// Observation was stopped locally.
    Halt,
    /// A manual retry after the transport gave up.
    ResumeObservation,
}

/// Owns the live execution state and the history of finished runs.
#[derive(Debug, Clone, Default)]
pub struct ExecutionStore {
    state: ExecutionState,
    history: ExecutionHistory,
}

impl ExecutionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live state.
    #[must_use]
    pub fn current(&self) -> &ExecutionState {
        &self.state
    }

    /// Returns snapshots of finished runs, newest first.
    #[must_use]
    pub fn history(&self) -> &ExecutionHistory {
        &self.history
    }

    /// Applies an action, recording a snapshot when a live run finishes.
    pub fn dispatch(&mut self, action: ExecutionAction) {
        let was_terminal = self.state.status.is_terminal();
        let loads_snapshot = matches!(action, ExecutionAction::LoadState(_));
        self.state.reduce(action);
        let finished = !was_terminal && self.state.status.is_terminal();
        if finished && !loads_snapshot && !self.state.connection_lost {
            info!(
                execution_id = ?self.state.execution_id,
                status = %self.state.status,
                "Execution finished"
            );
            self.history.record(self.state.clone());
        }
    }
}
