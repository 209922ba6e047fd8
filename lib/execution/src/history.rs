//! Snapshots of finished executions.

use crate::state::ExecutionState;
use std::collections::VecDeque;

/// Number of finished executions kept.
pub const EXECUTION_HISTORY_LIMIT: usize = 20;

/// Frozen states of recently finished executions, newest first.
#[derive(Debug, Clone)]
pub struct ExecutionHistory {
    entries: VecDeque<ExecutionState>,
    limit: usize,
}

impl ExecutionHistory {
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit),
            limit: limit.max(1),
        }
    }

    /// Records a finished execution, evicting the oldest past the limit.
    pub fn record(&mut self, snapshot: ExecutionState) {
        self.entries.push_front(snapshot);
        self.entries.truncate(self.limit);
    }

    /// Returns snapshots, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &ExecutionState> {
        self.entries.iter()
    }

    /// Returns the most recent snapshot.
    #[must_use]
    pub fn latest(&self) -> Option<&ExecutionState> {
        self.entries.front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ExecutionHistory {
    fn default() -> Self {
        Self::with_limit(EXECUTION_HISTORY_LIMIT)
    }
}
