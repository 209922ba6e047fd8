//! Bounded undo/redo history of graph snapshots.
//!
//! The contract is "push before mutate": callers snapshot the graph with
//! [`HistoryStack::push`] immediately before every structural mutation, so
//! each entry is the state *preceding* one user action. Pushing clears the
//! redo stack.

use crate::graph::GraphDocument;
use std::collections::VecDeque;

/// Default number of entries kept on each stack.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Undo and redo stacks, most recent entry last.
#[derive(Debug, Clone)]
pub struct HistoryStack {
    undo: VecDeque<GraphDocument>,
    redo: VecDeque<GraphDocument>,
    limit: usize,
}

impl HistoryStack {
    /// Creates a history with the default bound.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Creates a history keeping at most `limit` entries per stack.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            undo: VecDeque::with_capacity(limit),
            redo: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Records `current` as the state to return to on the next undo.
    pub fn push(&mut self, current: &GraphDocument) {
        Self::push_bounded(&mut self.undo, current.clone(), self.limit);
        self.redo.clear();
    }

    /// Steps back one entry.
    ///
    /// `current` is moved onto the redo stack. Returns `None` when there is
    /// nothing to undo.
    pub fn undo(&mut self, current: &GraphDocument) -> Option<GraphDocument> {
        let previous = self.undo.pop_back()?;
        Self::push_bounded(&mut self.redo, current.clone(), self.limit);
        Some(previous)
    }

    /// Steps forward one entry.
    ///
    /// `current` is moved onto the undo stack. Returns `None` when there is
    /// nothing to redo.
    pub fn redo(&mut self, current: &GraphDocument) -> Option<GraphDocument> {
        let next = self.redo.pop_back()?;
        Self::push_bounded(&mut self.undo, current.clone(), self.limit);
        Some(next)
    }

    /// Returns true if an undo is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Returns true if a redo is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Returns the number of undo entries.
    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Returns the number of redo entries.
    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Drops all history.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    fn push_bounded(stack: &mut VecDeque<GraphDocument>, entry: GraphDocument, limit: usize) {
        if stack.len() == limit {
            stack.pop_front();
        }
        stack.push_back(entry);
    }
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new()
    }
}
