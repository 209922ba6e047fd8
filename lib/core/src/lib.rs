//! Core types shared by every flowcanvas crate.
//!
//! This crate provides the strongly-typed identifiers used by the graph
//! model and the execution overlay.

pub mod id;

pub use id::{EdgeId, ExecutionId, NodeId, ParseIdError, WorkflowId};
