//! Keyboard shortcuts.
//!
//! | Keys                                   | Action              |
//! |----------------------------------------|---------------------|
//! | `Ctrl/Cmd+Z`                           | Undo                |
//! | `Ctrl/Cmd+Shift+Z`, `Ctrl/Cmd+Y`       | Redo                |
//! | `Ctrl/Cmd+C` / `Ctrl/Cmd+V`            | Copy / paste        |
//! | `Ctrl/Cmd+A`                           | Select all          |
//! | `Delete`, `Backspace`                  | Delete selection    |
//! | `Shift+L`                              | Auto-layout         |
//! | bare single character                  | Add the mapped kind |
//!
//! Keys typed into an editable field never reach the canvas.

use crate::preferences::Preferences;
use crate::session::{EditorSession, PasteOutcome};
use flowcanvas_graph::{NodeKind, Position};
use tracing::{debug, warn};

/// A key press as delivered by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
    /// The event target is a text input or other editable element.
    pub editable_target: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    #[must_use]
    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    #[must_use]
    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    #[must_use]
    pub fn in_editable(mut self) -> Self {
        self.editable_target = true;
        self
    }

    fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// System clipboard access.
pub trait Clipboard {
    fn read_text(&mut self) -> Option<String>;
    fn write_text(&mut self, text: String);
}

/// What a key press resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    Undo,
    Redo,
    Copy,
    Paste,
    SelectAll,
    DeleteSelection,
    AutoLayout,
    AddNode(NodeKind),
}

/// Routes key presses to editing operations.
#[derive(Debug, Clone, Default)]
pub struct ShortcutDispatcher {
    preferences: Preferences,
    insert_at: Position,
}

impl ShortcutDispatcher {
    pub fn new(preferences: Preferences) -> Self {
        Self {
            preferences,
            insert_at: Position::default(),
        }
    }

    /// Swaps in reloaded preferences.
    pub fn set_preferences(&mut self, preferences: Preferences) {
        self.preferences = preferences;
    }

    /// Sets where shortcut-added nodes are placed, usually the viewport center.
    pub fn set_insert_position(&mut self, position: Position) {
        self.insert_at = position;
    }

    /// Maps a key press to an action without performing it.
    #[must_use]
    pub fn resolve(&self, event: &KeyEvent) -> Option<ShortcutAction> {
        if event.editable_target {
            return None;
        }
        let key = event.key.to_lowercase();

        if event.command() {
            return match (key.as_str(), event.shift) {
                ("z", false) => Some(ShortcutAction::Undo),
                ("z", true) | ("y", _) => Some(ShortcutAction::Redo),
                ("c", _) => Some(ShortcutAction::Copy),
                ("v", _) => Some(ShortcutAction::Paste),
                ("a", _) => Some(ShortcutAction::SelectAll),
                _ => None,
            };
        }

        match key.as_str() {
            "delete" | "backspace" => Some(ShortcutAction::DeleteSelection),
            "l" if event.shift && !event.alt => Some(ShortcutAction::AutoLayout),
            _ if event.alt || event.shift => None,
            _ => self.preferences.shortcut_for(&key).map(ShortcutAction::AddNode),
        }
    }

    /// Resolves and performs a key press.
    ///
    /// Returns the action taken, or `None` if the key is not bound.
    pub fn dispatch(
        &self,
        event: &KeyEvent,
        session: &mut EditorSession,
        clipboard: &mut dyn Clipboard,
    ) -> Option<ShortcutAction> {
        let action = self.resolve(event)?;
        match action {
            ShortcutAction::Undo => {
                session.undo();
            }
            ShortcutAction::Redo => {
                session.redo();
            }
            ShortcutAction::Copy => match session.copy() {
                Ok(Some(text)) => clipboard.write_text(text),
                Ok(None) => debug!("Nothing to copy"),
                Err(e) => warn!(error = %e, "Copy failed"),
            },
            ShortcutAction::Paste => {
                if let Some(text) = clipboard.read_text()
                    && session.paste(&text) == PasteOutcome::Ignored
                {
                    debug!("Clipboard held nothing to paste");
                }
            }
            ShortcutAction::SelectAll => session.select_all(),
            ShortcutAction::DeleteSelection => {
                session.delete_selected();
            }
            ShortcutAction::AutoLayout => {
                session.auto_layout(true);
            }
            ShortcutAction::AddNode(kind) => {
                if let Err(e) = session.add_node(kind, self.insert_at) {
                    warn!(error = %e, kind = %kind, "Shortcut failed to add node");
                }
            }
        }
        Some(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MemoryClipboard {
        text: Option<String>,
    }

    impl Clipboard for MemoryClipboard {
        fn read_text(&mut self) -> Option<String> {
            self.text.clone()
        }

        fn write_text(&mut self, text: String) {
            self.text = Some(text);
        }
    }

    fn dispatcher() -> ShortcutDispatcher {
        let mut preferences = Preferences::default();
        preferences.set_shortcut("h", NodeKind::Http).unwrap();
        ShortcutDispatcher::new(preferences)
    }

    #[test]
    fn resolves_command_bindings() {
        let d = dispatcher();
        assert_eq!(d.resolve(&KeyEvent::new("z").ctrl()), Some(ShortcutAction::Undo));
        assert_eq!(d.resolve(&KeyEvent::new("z").meta()), Some(ShortcutAction::Undo));
        assert_eq!(d.resolve(&KeyEvent::new("Z").ctrl().shift()), Some(ShortcutAction::Redo));
        assert_eq!(d.resolve(&KeyEvent::new("y").meta()), Some(ShortcutAction::Redo));
        assert_eq!(d.resolve(&KeyEvent::new("c").ctrl()), Some(ShortcutAction::Copy));
        assert_eq!(d.resolve(&KeyEvent::new("v").ctrl()), Some(ShortcutAction::Paste));
        assert_eq!(d.resolve(&KeyEvent::new("a").meta()), Some(ShortcutAction::SelectAll));
        assert_eq!(d.resolve(&KeyEvent::new("h").ctrl()), None);
    }

    #[test]
    fn resolves_bare_keys() {
        let d = dispatcher();
        assert_eq!(d.resolve(&KeyEvent::new("Delete")), Some(ShortcutAction::DeleteSelection));
        assert_eq!(d.resolve(&KeyEvent::new("Backspace")), Some(ShortcutAction::DeleteSelection));
        assert_eq!(d.resolve(&KeyEvent::new("L").shift()), Some(ShortcutAction::AutoLayout));
        assert_eq!(d.resolve(&KeyEvent::new("H")), Some(ShortcutAction::AddNode(NodeKind::Http)));
        assert_eq!(d.resolve(&KeyEvent::new("q")), None);
        assert_eq!(d.resolve(&KeyEvent::new("l")), None);
    }

    #[test]
    fn editable_targets_are_ignored() {
        let d = dispatcher();
        assert_eq!(d.resolve(&KeyEvent::new("z").ctrl().in_editable()), None);
        assert_eq!(d.resolve(&KeyEvent::new("Backspace").in_editable()), None);
        assert_eq!(d.resolve(&KeyEvent::new("h").in_editable()), None);
    }

    #[test]
    fn copy_then_paste_through_clipboard() {
        let d = dispatcher();
        let mut session = EditorSession::new();
        let mut clipboard = MemoryClipboard::default();

        d.dispatch(&KeyEvent::new("h"), &mut session, &mut clipboard);
        assert_eq!(session.graph().nodes.len(), 1);

        d.dispatch(&KeyEvent::new("c").ctrl(), &mut session, &mut clipboard);
        assert!(clipboard.text.is_some());
        d.dispatch(&KeyEvent::new("v").ctrl(), &mut session, &mut clipboard);
        assert_eq!(session.graph().nodes.len(), 2);

        d.dispatch(&KeyEvent::new("a").ctrl(), &mut session, &mut clipboard);
        d.dispatch(&KeyEvent::new("Delete"), &mut session, &mut clipboard);
        assert!(session.graph().is_empty());

        d.dispatch(&KeyEvent::new("z").ctrl(), &mut session, &mut clipboard);
        assert_eq!(session.graph().nodes.len(), 2);
        d.dispatch(&KeyEvent::new("z").ctrl().shift(), &mut session, &mut clipboard);
        assert!(session.graph().is_empty());
    }

    #[test]
    fn pasting_foreign_text_changes_nothing() {
        let d = dispatcher();
        let mut session = EditorSession::new();
        let mut clipboard = MemoryClipboard {
            text: Some("just some notes".to_string()),
        };
        let action = d.dispatch(&KeyEvent::new("v").ctrl(), &mut session, &mut clipboard);
        assert_eq!(action, Some(ShortcutAction::Paste));
        assert!(session.graph().is_empty());
        assert!(!session.history().can_undo());
    }
}
