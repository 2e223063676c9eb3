//! External collaborators - the planner, narrator and memory store.
//!
//! Language-model planning and narration and semantic memory live outside this
//! crate. The pipeline talks to them through these traits; the deterministic
//! implementations here make a session fully runnable offline.

mod memory;
mod mock;

pub use memory::*;
pub use mock::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::CollaboratorError;
use crate::pipeline::TurnState;

/// Proposes a draft op batch for a turn.
pub trait Planner: Send {
    /// Return loose op items. Structure is checked later by the rule engine.
    fn plan(&mut self, state: &TurnState) -> Result<Vec<Value>, CollaboratorError>;
}

/// Produces the narration text for a turn.
pub trait Narrator: Send {
    fn narrate(&mut self, state: &TurnState) -> Result<String, CollaboratorError>;
}

/// Long-term memory written by `LogMemory` ops and turn summaries.
pub trait MemoryStore: Send {
    fn add_memory(
        &mut self,
        text: &str,
        tags: &BTreeSet<String>,
        entities: &BTreeSet<String>,
    ) -> Result<MemoryEntry, CollaboratorError>;

    /// Best matches for `query`, at most `k`.
    fn search(&self, query: &str, k: usize) -> Result<Vec<MemoryEntry>, CollaboratorError>;
}

/// One stored memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: Uuid,
    pub text: String,
    pub tags: BTreeSet<String>,
    pub entities: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl MemoryEntry {
    /// Create an entry with a fresh id, stamped now.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            tags: BTreeSet::new(),
            entities: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    /// Set the tags.
    pub fn with_tags(mut self, tags: &BTreeSet<String>) -> Self {
        self.tags = tags.clone();
        self
    }

    /// Set the referenced entity ids.
    pub fn with_entities(mut self, entities: &BTreeSet<String>) -> Self {
        self.entities = entities.clone();
        self
    }
}

/// The three collaborators a pipeline needs.
pub struct Collaborators {
    pub planner: Box<dyn Planner>,
    pub narrator: Box<dyn Narrator>,
    pub memory: Box<dyn MemoryStore>,
}

impl Collaborators {
    /// Bundle three collaborators.
    pub fn new(
        planner: impl Planner + 'static,
        narrator: impl Narrator + 'static,
        memory: impl MemoryStore + 'static,
    ) -> Self {
        Self {
            planner: Box::new(planner),
            narrator: Box::new(narrator),
            memory: Box::new(memory),
        }
    }

    /// Offline collaborators: mock planner and narrator, in-memory store.
    pub fn mock() -> Self {
        Self::new(MockPlanner, MockNarrator, InMemoryMemoryStore::new())
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
