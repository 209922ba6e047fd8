//! Persisted local preferences.
//!
//! Preferences live in a single JSON file:
//!
//! ```json
//! { "shortcuts": { "h": "http", "e": "email" }, "pending_assistant_prompt": "..." }
//! ```

use crate::error::PreferenceError;
use flowcanvas_graph::NodeKind;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name used inside a preferences directory.
pub const PREFERENCES_FILE: &str = "preferences.json";

/// Local editor preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Lower-case single-character key to the node kind it adds.
    #[serde(default)]
    pub shortcuts: BTreeMap<String, NodeKind>,
    /// A prompt to hand to the assistant the next time a canvas opens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_assistant_prompt: Option<String>,
}

impl Preferences {
    /// Maps `key` to `kind`.
    ///
    /// Keys are case-insensitive. Any earlier mapping of the same key, or of
    /// the same kind to another key, is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is not exactly one character.
    pub fn set_shortcut(&mut self, key: &str, kind: NodeKind) -> Result<(), PreferenceError> {
        let key = normalize_key(key).ok_or_else(|| PreferenceError::InvalidShortcut {
            key: key.to_string(),
        })?;
        self.shortcuts.retain(|_, mapped| *mapped != kind);
        self.shortcuts.insert(key, kind);
        Ok(())
    }

    /// Removes the mapping of `key`, returning the kind it pointed to.
    pub fn remove_shortcut(&mut self, key: &str) -> Option<NodeKind> {
        self.shortcuts.remove(&normalize_key(key)?)
    }

    /// Returns the kind mapped to `key`.
    #[must_use]
    pub fn shortcut_for(&self, key: &str) -> Option<NodeKind> {
        self.shortcuts.get(&normalize_key(key)?).copied()
    }
}

fn normalize_key(key: &str) -> Option<String> {
    let mut chars = key.chars();
    let c = chars.next()?;
    if chars.next().is_some() || c.is_whitespace() {
        return None;
    }
    Some(c.to_lowercase().collect())
}

/// JSON file backing for [`Preferences`].
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Uses [`PREFERENCES_FILE`] inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(PREFERENCES_FILE))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads preferences. A missing file yields the defaults.
    pub fn load(&self) -> Result<Preferences, Report<PreferenceError>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No preference file, using defaults");
                return Ok(Preferences::default());
            }
            Err(e) => {
                return Err(PreferenceError::Read {
                    path: self.path.clone(),
                    details: e.to_string(),
                }
                .into());
            }
        };
        let preferences = serde_json::from_str(&text).map_err(|e| PreferenceError::Parse {
            path: self.path.clone(),
            details: e.to_string(),
        })?;
        Ok(preferences)
    }

    /// Writes preferences, creating the parent directory if needed.
    ///
    /// The file is replaced in one rename so a crash never leaves it
    /// half-written.
    pub fn save(&self, preferences: &Preferences) -> Result<(), Report<PreferenceError>> {
        let write_error = |e: std::io::Error| PreferenceError::Write {
            path: self.path.clone(),
            details: e.to_string(),
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        let text = serde_json::to_string_pretty(preferences).map_err(|e| PreferenceError::Write {
            path: self.path.clone(),
            details: e.to_string(),
        })?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, text).map_err(write_error)?;
        fs::rename(&staging, &self.path).map_err(write_error)?;
        Ok(())
    }

    /// Maps a shortcut key and saves.
    pub fn set_shortcut(&self, key: &str, kind: NodeKind) -> Result<Preferences, Report<PreferenceError>> {
        let mut preferences = self.load()?;
        preferences.set_shortcut(key, kind)?;
        self.save(&preferences)?;
        info!(key, kind = %kind, "Shortcut saved");
        Ok(preferences)
    }

    /// Stores a prompt for the next canvas mount.
    pub fn set_pending_prompt(&self, prompt: impl Into<String>) -> Result<(), Report<PreferenceError>> {
        let mut preferences = self.load()?;
        preferences.pending_assistant_prompt = Some(prompt.into());
        self.save(&preferences)
    }

    /// Returns the pending prompt and removes it, so it is consumed once.
    pub fn take_pending_prompt(&self) -> Result<Option<String>, Report<PreferenceError>> {
        let mut preferences = self.load()?;
        let prompt = preferences.pending_assistant_prompt.take();
        if prompt.is_some() {
            self.save(&preferences)?;
        }
        Ok(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn shortcuts_are_case_insensitive() {
        let mut preferences = Preferences::default();
        preferences.set_shortcut("H", NodeKind::Http).unwrap();
        assert_eq!(preferences.shortcut_for("h"), Some(NodeKind::Http));
        assert_eq!(preferences.shortcut_for("H"), Some(NodeKind::Http));
        assert!(preferences.shortcuts.contains_key("h"));
    }

    #[test]
    fn last_write_wins_on_key_and_kind() {
        let mut preferences = Preferences::default();
        preferences.set_shortcut("h", NodeKind::Http).unwrap();
        preferences.set_shortcut("h", NodeKind::Email).unwrap();
        assert_eq!(preferences.shortcut_for("h"), Some(NodeKind::Email));

        preferences.set_shortcut("m", NodeKind::Email).unwrap();
        assert_eq!(preferences.shortcut_for("h"), None);
        assert_eq!(preferences.shortcuts.len(), 1);
    }

    #[test]
    fn multi_character_keys_are_rejected() {
        let mut preferences = Preferences::default();
        assert!(preferences.set_shortcut("ab", NodeKind::Http).is_err());
        assert!(preferences.set_shortcut("", NodeKind::Http).is_err());
        assert!(preferences.set_shortcut(" ", NodeKind::Http).is_err());
        assert!(preferences.shortcuts.is_empty());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let store = FilePreferenceStore::in_dir(dir.path());
        assert_eq!(store.load().unwrap(), Preferences::default());
    }

    #[test]
    fn shortcuts_persist() {
        let dir = TempDir::new().unwrap();
        let store = FilePreferenceStore::in_dir(dir.path().join("nested"));
        store.set_shortcut("E", NodeKind::Email).unwrap();

        let reopened = FilePreferenceStore::in_dir(dir.path().join("nested"));
        assert_eq!(reopened.load().unwrap().shortcut_for("e"), Some(NodeKind::Email));
    }

    #[test]
    fn pending_prompt_is_consumed_once() {
        let dir = TempDir::new().unwrap();
        let store = FilePreferenceStore::in_dir(dir.path());
        store.set_pending_prompt("Build a lead router").unwrap();

        assert_eq!(store.take_pending_prompt().unwrap().as_deref(), Some("Build a lead router"));
        assert_eq!(store.take_pending_prompt().unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FilePreferenceStore::in_dir(dir.path());
        fs::write(store.path(), "{ nope").unwrap();
        assert!(store.load().is_err());
    }
}
