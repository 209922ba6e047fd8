//! Editing layer for flowcanvas.
//!
//! - **Session**: The single mutation path for a canvas, with undo history
//! - **Shortcuts**: Keyboard routing onto session operations
//! - **Preferences**: Shortcut mappings and the pending assistant prompt
//! - **Assistant**: Streamed graph proposals applied as one undoable step

pub mod assistant;
pub mod error;
pub mod preferences;
pub mod session;
pub mod shortcut;

pub use assistant::{AssistantEvent, AssistantSession, AssistantState};
pub use error::{EditorError, PreferenceError};
pub use preferences::{FilePreferenceStore, PREFERENCES_FILE, Preferences};
pub use session::{EditorSession, PasteOutcome};
pub use shortcut::{Clipboard, KeyEvent, ShortcutAction, ShortcutDispatcher};
