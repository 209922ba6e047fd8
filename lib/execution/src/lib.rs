//! Execution overlay for flowcanvas.
//!
//! This crate tracks the live state of a workflow run and keeps it in sync
//! with the executor:
//!
//! - [`telemetry`]: The JSON messages streamed by the executor
//! - [`state`]: The execution state, its actions and reducer
//! - [`history`]: Snapshots of finished runs
//! - [`highlight`]: Edge styling derived from node statuses
//! - [`transport`]: Telemetry streams over WebSocket
//! - [`sync`]: The connect, forward and reconnect loop
//! - [`run`]: Starting runs over HTTP
//! - [`controller`]: Ties the store, transport and run client together

pub mod controller;
pub mod error;
pub mod highlight;
pub mod history;
pub mod reconnect;
pub mod run;
pub mod state;
pub mod sync;
pub mod telemetry;
pub mod transport;

pub use controller::ExecutionController;
pub use error::{RunError, TransportError};
pub use highlight::{EdgeOverlay, apply_edge_highlighting, clear_edge_highlighting, edge_overlay};
pub use history::{EXECUTION_HISTORY_LIMIT, ExecutionHistory};
pub use reconnect::{ReconnectConfig, ReconnectPolicy, should_connect};
pub use run::{HttpRunClient, RunClient};
pub use state::{ExecutionAction, ExecutionState, ExecutionStore, NodeExecutionData};
pub use sync::{SyncEvent, SyncUpdate, run_sync};
pub use telemetry::{Lineage, NodeStatus, TelemetryMessage, WorkflowStatus};
pub use transport::{TelemetryConnector, TelemetryFrame, TelemetryStream, WebSocketConnector};
