//! Runtime settings and per-save-slot file layout.
//!
//! Settings are an explicit value handed to the session at startup; persisting
//! them is the job of [`SettingsStore`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SettingsError;

/// Tunables for retrieval, history windows and narration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Cards retrieved per turn.
    pub top_k_cards: usize,
    /// Memories retrieved per turn.
    pub top_k_memories: usize,
    /// Messages handed to the planner and narrator.
    pub max_recent_messages: usize,
    /// Messages kept as "recent" on the session after each turn.
    pub history_window: usize,
    /// Narration language code ("zh" or "en").
    pub language: String,
    /// Directory holding one subdirectory per save slot.
    pub data_root: PathBuf,
    /// Re-read both stores after ApplyUpdates so narration sees the mutated world.
    pub refresh_facts_before_narration: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            top_k_cards: 6,
            top_k_memories: 4,
            max_recent_messages: 6,
            history_window: 10,
            language: "zh".to_string(),
            data_root: PathBuf::from("data/saves"),
            refresh_facts_before_narration: false,
        }
    }
}

impl Settings {
    /// Set the directory holding save slots.
    pub fn with_data_root(mut self, data_root: impl Into<PathBuf>) -> Self {
        self.data_root = data_root.into();
        self
    }

    /// Set the narration language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// File layout of `save_slot` under the data root.
    pub fn slot_paths(&self, save_slot: &str) -> SlotPaths {
        SlotPaths::for_slot(&self.data_root, save_slot)
    }
}

/// Loads and saves [`Settings`] as a TOML file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Create a store backed by the TOML file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the settings file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read settings; a missing file yields the defaults.
    pub fn load(&self) -> Result<Settings, SettingsError> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let text = std::fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Write `settings` as TOML, creating parent directories.
    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, toml::to_string_pretty(settings)?)?;
        Ok(())
    }
}

/// Files belonging to one save slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPaths {
    pub data_dir: PathBuf,
    pub snapshot_dir: PathBuf,
    pub edge_db_path: PathBuf,
    pub attr_db_path: PathBuf,
    pub chat_history_path: PathBuf,
}

impl SlotPaths {
    /// Derive the layout of `<data_root>/<save_slot>/`.
    pub fn for_slot(data_root: &Path, save_slot: &str) -> Self {
        let data_dir = data_root.join(save_slot);
        Self {
            snapshot_dir: data_dir.join("state_snapshot"),
            edge_db_path: data_dir.join("kg.sqlite"),
            attr_db_path: data_dir.join("world.sqlite"),
            chat_history_path: data_dir.join("chat_history.json"),
            data_dir,
        }
    }
}
