//! Game session - one save slot, its stores and its chat history.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use game_rules::{CardIndex, RuleConfig, WorldFacts};

use crate::collaborators::Collaborators;
use crate::config::{Settings, SlotPaths};
use crate::error::SessionError;
use crate::pipeline::{ChatMessage, Role, TurnPipeline, TurnState, WorldStores};

/// Serializable view of a session for front-ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub save_slot: String,
    pub turn_id: u64,
    pub language: String,
    pub recent_messages: Vec<ChatMessage>,
    pub world_facts: WorldFacts,
    pub allowed_actions: Vec<String>,
    pub last_narration: Option<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// A running game bound to one save slot.
///
/// `step` is synchronous; one turn runs to completion before the next starts.
#[derive(Debug)]
pub struct GameSession {
    save_slot: String,
    paths: SlotPaths,
    pipeline: TurnPipeline,
    turn_id: u64,
    chat_history: Vec<ChatMessage>,
    recent_messages: Vec<ChatMessage>,
    world_facts: WorldFacts,
    last_turn: Option<TurnState>,
}

impl GameSession {
    /// Open a save slot, seeding the edge store from card initial relations
    /// when it is empty and reloading the chat history.
    ///
    /// The turn counter resumes from the number of player messages in the history.
    pub fn open(
        settings: Settings,
        save_slot: &str,
        cards: CardIndex,
        rules: RuleConfig,
        overlay_roots: Vec<PathBuf>,
        collaborators: Collaborators,
    ) -> Result<Self, SessionError> {
        let paths = settings.slot_paths(save_slot);
        let stores = WorldStores::open(&paths)?;
        stores.edges.bootstrap(&cards)?;

        let chat_history = load_chat_history(&paths.chat_history_path);
        let turn_id = chat_history
            .iter()
            .filter(|m| m.role == Role::User)
            .count() as u64;
        let recent_messages = tail(&chat_history, settings.history_window);

        let pipeline = TurnPipeline::new(settings, cards, rules, stores, collaborators)
            .with_overlay_roots(overlay_roots);
        let world_facts = pipeline.world_facts()?;

        tracing::info!(
            slot = save_slot,
            turn_id,
            messages = chat_history.len(),
            "opened game session"
        );

        Ok(Self {
            save_slot: save_slot.to_string(),
            paths,
            pipeline,
            turn_id,
            chat_history,
            recent_messages,
            world_facts,
            last_turn: None,
        })
    }

    /// Run one turn for `input`.
    ///
    /// The turn counter advances even when the turn fails.
    pub fn step(&mut self, input: &str) -> Result<&TurnState, SessionError> {
        self.turn_id += 1;
        let mut state = TurnState::new(self.turn_id, input, self.language())
            .with_chat_history(self.chat_history.clone());

        self.pipeline.run(&mut state)?;

        self.chat_history.push(ChatMessage::user(input));
        self.chat_history
            .push(ChatMessage::assistant(state.narration.clone()));
        self.recent_messages = tail(&self.chat_history, self.pipeline.settings().history_window);
        self.world_facts = self.pipeline.world_facts()?;
        save_chat_history(&self.paths.chat_history_path, &self.chat_history)?;

        Ok(&*self.last_turn.insert(state))
    }

    /// Snapshot of the session for a front-end.
    pub fn view(&self) -> SessionView {
        let last = self.last_turn.as_ref();
        SessionView {
            save_slot: self.save_slot.clone(),
            turn_id: self.turn_id,
            language: self.language().to_string(),
            recent_messages: self.recent_messages.clone(),
            world_facts: self.world_facts.clone(),
            allowed_actions: self.pipeline.engine().allowed_actions(&self.world_facts),
            last_narration: last.map(|t| t.narration.clone()),
            errors: last.map(|t| t.errors.clone()).unwrap_or_default(),
            warnings: last.map(|t| t.warnings.clone()).unwrap_or_default(),
        }
    }

    /// Switch the narration language for later turns.
    pub fn set_language(&mut self, language: impl Into<String>) {
        self.pipeline.settings_mut().language = language.into();
    }

    /// The current narration language.
    pub fn language(&self) -> &str {
        &self.pipeline.settings().language
    }

    /// Number of turns run on this slot so far.
    pub fn turn_id(&self) -> u64 {
        self.turn_id
    }

    /// Name of the save slot.
    pub fn save_slot(&self) -> &str {
        &self.save_slot
    }

    /// File layout of the save slot.
    pub fn paths(&self) -> &SlotPaths {
        &self.paths
    }

    /// The full persisted chat history.
    pub fn chat_history(&self) -> &[ChatMessage] {
        &self.chat_history
    }

    /// The last `history_window` messages.
    pub fn recent_messages(&self) -> &[ChatMessage] {
        &self.recent_messages
    }

    /// World facts as of the end of the last turn.
    pub fn world_facts(&self) -> &WorldFacts {
        &self.world_facts
    }

    /// State of the most recent turn, if any ran since opening.
    pub fn last_turn(&self) -> Option<&TurnState> {
        self.last_turn.as_ref()
    }

    /// The underlying turn pipeline.
    pub fn pipeline(&self) -> &TurnPipeline {
        &self.pipeline
    }
}

fn tail(messages: &[ChatMessage], n: usize) -> Vec<ChatMessage> {
    messages[messages.len().saturating_sub(n)..].to_vec()
}

/// Missing or unreadable history starts the slot fresh. Entries that are not
/// well-formed messages are dropped one by one.
fn load_chat_history(path: &Path) -> Vec<ChatMessage> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read chat history");
            return Vec::new();
        }
    };
    let entries: Vec<serde_json::Value> = match serde_json::from_str(&text) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "discarding malformed chat history");
            return Vec::new();
        }
    };

    let total = entries.len();
    let history: Vec<ChatMessage> = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect();
    if history.len() < total {
        tracing::warn!(
            path = %path.display(),
            dropped = total - history.len(),
            "skipping unrecognised chat history entries"
        );
    }
    history
}

fn save_chat_history(path: &Path, history: &[ChatMessage]) -> Result<(), SessionError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(SessionError::ChatHistory)?;
    }
    let text = serde_json::to_string_pretty(history)?;
    std::fs::write(path, text).map_err(SessionError::ChatHistory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_rules::Card;

    fn open(dir: &Path) -> GameSession {
        let settings = Settings::default().with_data_root(dir).with_language("en");
        let cards = CardIndex::from_cards([
            Card::new("player", "character").with_initial_relation("player", "at", "forest"),
            Card::new("forest", "location"),
        ]);
        GameSession::open(settings, "slot1", cards, RuleConfig::new(), Vec::new(), Collaborators::mock())
            .unwrap()
    }

    #[test]
    fn test_open_bootstraps_and_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let session = open(dir.path());

        assert_eq!(session.turn_id(), 0);
        assert_eq!(session.world_facts().edges.len(), 1);
        assert!(session.view().last_narration.is_none());
    }

    #[test]
    fn test_step_records_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = open(dir.path());

        let narration = session.step("look").unwrap().narration.clone();
        assert_eq!(session.turn_id(), 1);
        assert_eq!(session.chat_history().len(), 2);
        assert_eq!(session.chat_history()[1].content, narration);
        assert!(session.paths().chat_history_path.exists());
    }

    #[test]
    fn test_malformed_history_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "[{oops").unwrap();
        assert!(load_chat_history(&path).is_empty());
        assert!(load_chat_history(&dir.path().join("missing.json")).is_empty());
    }

    #[test]
    fn test_unrecognised_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(
            &path,
            r#"[
                {"role": "user", "content": "look"},
                {"role": "assistant", "content": "You see a forest."},
                {"role": "system", "content": "be terse"},
                {"content": "no role"}
            ]"#,
        )
        .unwrap();

        let history = load_chat_history(&path);
        assert_eq!(history, vec![ChatMessage::user("look"), ChatMessage::assistant("You see a forest.")]);
    }

    #[test]
    fn test_reopen_with_foreign_entry_keeps_turn_count() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut session = open(dir.path());
            session.step("look").unwrap();
            session.step("wait").unwrap();
        }
        let path = open(dir.path()).paths().chat_history_path.clone();
        let mut entries: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        entries.push(serde_json::json!({"role": "system", "content": "note"}));
        std::fs::write(&path, serde_json::to_string(&entries).unwrap()).unwrap();

        let session = open(dir.path());
        assert_eq!(session.chat_history().len(), 4);
        assert_eq!(session.turn_id(), 2);
    }

    #[test]
    fn test_set_language_changes_narration() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = open(dir.path());
        session.set_language("zh");
        assert_eq!(session.language(), "zh");
        assert_eq!(session.step("看看").unwrap().language, "zh");
    }

    #[test]
    fn test_tail() {
        let msgs: Vec<_> = (0..3).map(|i| ChatMessage::user(i.to_string())).collect();
        assert_eq!(tail(&msgs, 2).len(), 2);
        assert_eq!(tail(&msgs, 10).len(), 3);
        assert!(tail(&msgs, 0).is_empty());
    }
}
