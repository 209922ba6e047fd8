//! Graph-state engine for the flowcanvas workflow editor.
//!
//! This crate owns the editable model of a workflow canvas:
//!
//! - **Node Kinds**: Closed registry mapping each kind to default data, handle schema and size
//! - **Graph Store**: The canonical node/edge collections behind a narrow mutation API
//! - **History**: Bounded undo/redo of graph snapshots
//! - **Connection Rules**: Which new edges the store accepts
//! - **Auto Layout**: Deterministic left-to-right layered layout honoring pinned nodes
//! - **Codec**: Sanitizing (de)serialization, clipboard envelopes, templates
//! - **Drag**: Per-frame coalescing of high-frequency position updates

pub mod clipboard;
pub mod codec;
pub mod connection;
pub mod drag;
pub mod edge;
pub mod error;
pub mod graph;
pub mod history;
pub mod layout;
pub mod node;
pub mod store;
pub mod template;

pub use clipboard::{PastePayload, copy_selection, decode_clipboard, remap_selection};
pub use codec::{parse_graph, sanitize_graph, stringify_graph};
pub use connection::{ConnectionRejection, validate_connection};
pub use drag::DragCoalescer;
pub use edge::{Edge, EdgeStyle};
pub use error::{CodecError, GraphError};
pub use graph::GraphDocument;
pub use history::HistoryStack;
pub use layout::{LayoutOptions, auto_layout};
pub use node::{Dimensions, HandleSchema, Node, NodeKind, Position};
pub use store::GraphStore;
pub use template::Template;
