//! The editing session.
//!
//! [`EditorSession`] is the single mutation path for a canvas. Every
//! structural change records the pre-change graph in history before it
//! touches the store, so the undo contract is enforced here and nowhere
//! else. Drag moves and execution overlay styling bypass history.

use crate::error::EditorError;
use flowcanvas_core::{EdgeId, NodeId};
use flowcanvas_execution::{ExecutionState, apply_edge_highlighting, clear_edge_highlighting};
use flowcanvas_graph::clipboard::PASTE_OFFSET;
use flowcanvas_graph::{
    CodecError, DragCoalescer, Edge, GraphDocument, GraphStore, HistoryStack, LayoutOptions, Node, NodeKind,
    PastePayload, Position, Template, auto_layout, copy_selection, decode_clipboard, parse_graph,
    remap_selection, stringify_graph, validate_connection,
};
use rootcause::prelude::Report;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

/// Result of a paste.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteOutcome {
    /// A copied selection was inserted; these are the new node IDs.
    Selection(Vec<NodeId>),
    /// A whole graph replaced the canvas; this many nodes were loaded.
    Replaced(usize),
    /// The clipboard held nothing usable. The canvas is untouched.
    Ignored,
}

/// One open canvas.
#[derive(Debug, Clone, Default)]
pub struct EditorSession {
    store: GraphStore,
    history: HistoryStack,
    drag: DragCoalescer,
    inspector_focus: Option<NodeId>,
    layout: LayoutOptions,
}

impl EditorSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session on an existing graph with empty history.
    #[must_use]
    pub fn from_document(graph: GraphDocument) -> Self {
        Self {
            store: GraphStore::from_document(graph),
            ..Self::default()
        }
    }

    /// Uses `history` instead of the default-sized one.
    #[must_use]
    pub fn with_history(mut self, history: HistoryStack) -> Self {
        self.history = history;
        self
    }

    /// Uses `options` for auto-layout.
    #[must_use]
    pub fn with_layout_options(mut self, options: LayoutOptions) -> Self {
        self.layout = options;
        self
    }

    /// Returns the live graph.
    #[must_use]
    pub fn graph(&self) -> &GraphDocument {
        self.store.current()
    }

    #[must_use]
    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    #[must_use]
    pub fn inspector_focus(&self) -> Option<&NodeId> {
        self.inspector_focus.as_ref()
    }

    /// Opens the inspector on a node, or closes it.
    pub fn focus(&mut self, node_id: Option<NodeId>) {
        self.inspector_focus = node_id.filter(|id| self.store.current().contains_node(id));
    }

    /// Records the current graph as the undo point of the next change.
    ///
    /// Pending drag deltas are written first so the snapshot matches what
    /// is on screen.
    pub fn push_history(&mut self) {
        self.drag.flush(&mut self.store);
        self.history.push(self.store.current());
    }

    /// Adds a node of `kind` with its default data and selects it.
    pub fn add_node(&mut self, kind: NodeKind, position: Position) -> Result<NodeId, Report<EditorError>> {
        self.push_history();
        let node_id = self
            .store
            .add_node(Node::new(kind, position))
            .map_err(|e| EditorError::Rejected { details: e.to_string() })?;
        self.store.select_only(std::slice::from_ref(&node_id));
        debug!(node_id = %node_id, kind = %kind, "Node added");
        Ok(node_id)
    }

    /// Deletes the selected nodes and their edges.
    ///
    /// Returns the number of nodes removed. Nothing is recorded when the
    /// selection is empty.
    pub fn delete_selected(&mut self) -> usize {
        let selected = self.store.selected_ids();
        if selected.is_empty() {
            return 0;
        }
        self.push_history();
        let removed = self.store.remove_nodes(&selected);
        if self
            .inspector_focus
            .as_ref()
            .is_some_and(|focus| selected.contains(focus))
        {
            self.inspector_focus = None;
        }
        debug!(removed, "Deleted selection");
        removed
    }

    /// Connects two nodes if the connection rules allow it.
    ///
    /// Rejected connections are refused silently: nothing is recorded and
    /// `None` is returned.
    pub fn connect(&mut self, source: &NodeId, target: &NodeId, source_handle: Option<&str>) -> Option<EdgeId> {
        if let Err(reason) = validate_connection(self.store.current(), source, target, source_handle) {
            debug!(source = %source, target = %target, reason = %reason, "Connection refused");
            return None;
        }

        let mut edge = Edge::new(source.clone(), target.clone());
        if let Some(handle) = source_handle {
            edge = edge.from_handle(handle);
        }
        edge.apply_branch_defaults();

        self.push_history();
        match self.store.add_edge(edge) {
            Ok(edge_id) => Some(edge_id),
            Err(e) => {
                debug!(error = %e, "Connection refused by store");
                None
            }
        }
    }

    /// Removes an edge. Returns false if it did not exist.
    pub fn remove_edge(&mut self, edge_id: &EdgeId) -> bool {
        if self.store.current().edge(edge_id).is_none() {
            return false;
        }
        self.push_history();
        self.store.remove_edges(std::slice::from_ref(edge_id)) == 1
    }

    /// Replaces a node's configuration.
    pub fn update_node_data(&mut self, node_id: &NodeId, data: JsonValue) -> Result<(), Report<EditorError>> {
        if !self.store.current().contains_node(node_id) {
            return Err(EditorError::NodeNotFound {
                node_id: node_id.clone(),
            }
            .into());
        }
        self.push_history();
        self.store
            .update_node_data(node_id, data)
            .map_err(|e| EditorError::Rejected { details: e.to_string() })?;
        Ok(())
    }

    /// Pins or unpins a node. Not recorded in history.
    pub fn set_pinned(&mut self, node_id: &NodeId, pinned: bool) -> Result<(), Report<EditorError>> {
        self.store
            .set_pinned(node_id, pinned)
            .map_err(|_| EditorError::NodeNotFound {
                node_id: node_id.clone(),
            })?;
        Ok(())
    }

    pub fn select(&mut self, node_id: &NodeId, additive: bool) {
        self.store.select(node_id, additive);
    }

    pub fn select_all(&mut self) {
        self.store.select_all();
    }

    pub fn clear_selection(&mut self) {
        self.store.clear_selection();
    }

    /// Serializes the selection, or the focused node, for the clipboard.
    pub fn copy(&self) -> Result<Option<String>, Report<CodecError>> {
        copy_selection(self.store.current(), self.inspector_focus.as_ref())
    }

    /// Pastes clipboard text.
    ///
    /// A copied selection is inserted next to the originals with fresh IDs
    /// and becomes the selection. A whole graph replaces the canvas.
    /// Anything else is ignored without touching history.
    pub fn paste(&mut self, text: &str) -> PasteOutcome {
        match decode_clipboard(text) {
            PastePayload::Selection(selection) => {
                self.push_history();
                let inserted = self
                    .store
                    .insert_subgraph(remap_selection(selection, PASTE_OFFSET));
                debug!(count = inserted.len(), "Pasted selection");
                PasteOutcome::Selection(inserted)
            }
            PastePayload::Graph(graph) => {
                let count = graph.nodes.len();
                self.replace_graph(graph);
                info!(nodes = count, "Pasted graph replaced canvas");
                PasteOutcome::Replaced(count)
            }
            PastePayload::Ignored => PasteOutcome::Ignored,
        }
    }

    /// Loads a graph file, replacing the canvas.
    ///
    /// Returns the number of nodes loaded.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the canvas untouched, if the file is not a
    /// usable graph.
    pub fn import_file(&mut self, text: &str) -> Result<usize, Report<CodecError>> {
        let graph = parse_graph(text)?;
        let count = graph.nodes.len();
        self.replace_graph(graph);
        info!(nodes = count, "Imported graph");
        Ok(count)
    }

    /// Serializes the canvas for saving, without selection or overlay state.
    pub fn export_file(&self) -> Result<String, Report<CodecError>> {
        stringify_graph(&Template::export("", "", self.store.current()).graph)
    }

    /// Captures the canvas as a template.
    #[must_use]
    pub fn export_template(&self, name: &str, category: &str) -> Template {
        Template::export(name, category, self.store.current())
    }

    /// Replaces the canvas with a template's graph.
    pub fn apply_template(&mut self, template: &Template) {
        self.replace_graph(template.graph.clone());
        info!(template = %template.name, "Applied template");
    }

    /// Applies a graph proposed by the assistant.
    pub fn apply_assistant_graph(&mut self, graph: GraphDocument) {
        let count = graph.nodes.len();
        self.replace_graph(graph);
        info!(nodes = count, "Applied assistant graph");
    }

    /// Repositions nodes with the auto-layout engine.
    ///
    /// Returns the number of nodes whose position changed. A layout that
    /// moves nothing leaves history untouched.
    pub fn auto_layout(&mut self, respect_pinned: bool) -> usize {
        self.drag.flush(&mut self.store);
        let laid_out = auto_layout(self.store.current(), respect_pinned, &self.layout);
        let current = self.store.current();
        let moved: Vec<(NodeId, Position)> = laid_out
            .nodes
            .into_iter()
            .filter(|n| current.node(&n.id).is_some_and(|old| old.position != n.position))
            .map(|n| (n.id, n.position))
            .collect();
        if moved.is_empty() {
            return 0;
        }

        self.push_history();
        let count = self.store.set_positions(moved);
        info!(moved = count, respect_pinned, "Layout applied");
        count
    }

    /// Starts a drag. The pre-drag graph becomes one undo step.
    pub fn begin_drag(&mut self) {
        self.push_history();
    }

    /// Moves a node by `(dx, dy)`; written at the next frame.
    pub fn drag_by(&mut self, node_id: NodeId, dx: f64, dy: f64) {
        self.drag.queue(node_id, dx, dy);
    }

    /// Writes the drag deltas collected since the last frame.
    pub fn end_frame(&mut self) -> usize {
        self.drag.flush(&mut self.store)
    }

    /// Finishes a drag.
    pub fn end_drag(&mut self) -> usize {
        self.end_frame()
    }

    /// Steps back one change. Returns false if there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        self.drag.flush(&mut self.store);
        let Some(previous) = self.history.undo(self.store.current()) else {
            return false;
        };
        self.restore(previous);
        true
    }

    /// Steps forward one change. Returns false if there was nothing to redo.
    pub fn redo(&mut self) -> bool {
        self.drag.flush(&mut self.store);
        let Some(next) = self.history.redo(self.store.current()) else {
            return false;
        };
        self.restore(next);
        true
    }

    /// Styles edges for an execution. Not recorded in history.
    pub fn show_execution(&mut self, state: &ExecutionState) -> usize {
        apply_edge_highlighting(state, &mut self.store)
    }

    /// Removes execution styling from every edge.
    pub fn clear_execution(&mut self) {
        clear_edge_highlighting(&mut self.store);
    }

    fn replace_graph(&mut self, graph: GraphDocument) {
        self.push_history();
        self.store.replace_all(graph);
        self.inspector_focus = None;
    }

    fn restore(&mut self, graph: GraphDocument) {
        self.store.replace_all(graph);
        if let Some(focus) = &self.inspector_focus
            && !self.store.current().contains_node(focus)
        {
            self.inspector_focus = None;
        }
    }
}
