//! Error types for the editor crate.
//!
//! - `EditorError`: Editing operations that cannot be applied
//! - `PreferenceError`: Loading or saving local preferences

use crate::assistant::AssistantState;
use flowcanvas_core::NodeId;
use std::fmt;
use std::path::PathBuf;

/// Errors from editing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    /// Node with the given ID was not found.
    NodeNotFound { node_id: NodeId },
    /// The graph store refused the change.
    Rejected { details: String },
    /// The assistant received an event its current state does not accept.
    InvalidTransition {
        state: AssistantState,
        event: &'static str,
    },
}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound { node_id } => write!(f, "node not found: {node_id}"),
            Self::Rejected { details } => write!(f, "change rejected: {details}"),
            Self::InvalidTransition { state, event } => {
                write!(f, "assistant cannot handle {event} while {state}")
            }
        }
    }
}

impl std::error::Error for EditorError {}

/// Errors from the preference store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceError {
    /// A shortcut key is not a single character.
    InvalidShortcut { key: String },
    /// Reading the preference file failed.
    Read { path: PathBuf, details: String },
    /// The preference file is not valid JSON.
    Parse { path: PathBuf, details: String },
    /// Writing the preference file failed.
    Write { path: PathBuf, details: String },
}

impl fmt::Display for PreferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidShortcut { key } => {
                write!(f, "shortcut key must be a single character, got '{key}'")
            }
            Self::Read { path, details } => write!(f, "failed to read {}: {details}", path.display()),
            Self::Parse { path, details } => write!(f, "failed to parse {}: {details}", path.display()),
            Self::Write { path, details } => write!(f, "failed to write {}: {details}", path.display()),
        }
    }
}

impl std::error::Error for PreferenceError {}
