//! Deterministic planner and narrator for offline play and tests.

use serde_json::Value;
use std::collections::VecDeque;

use game_rules::{LogMemory, Op, OpsDocument};

use super::{Narrator, Planner};
use crate::error::CollaboratorError;
use crate::pipeline::TurnState;

/// Planner that always proposes one "player waits" memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockPlanner;

impl Planner for MockPlanner {
    fn plan(&mut self, _state: &TurnState) -> Result<Vec<Value>, CollaboratorError> {
        let op = Op::LogMemory(
            LogMemory::new("Player waits and looks around.")
                .with_tag("mock")
                .with_entity("player"),
        );
        let value = op
            .to_value()
            .map_err(|e| CollaboratorError::Failed(e.to_string()))?;
        Ok(vec![value])
    }
}

/// Planner replaying queued batches, one per turn. Empty once exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPlanner {
    batches: VecDeque<Vec<Value>>,
}

impl ScriptedPlanner {
    /// Create a planner with no queued batches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one batch of loose op items.
    pub fn with_batch(mut self, batch: Vec<Value>) -> Self {
        self.batches.push_back(batch);
        self
    }

    /// Queue raw planner output text. Unreadable output becomes an empty batch.
    pub fn with_output(self, text: &str) -> Self {
        self.with_batch(OpsDocument::parse_lenient(text))
    }

    /// Number of batches not yet replayed.
    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

impl Planner for ScriptedPlanner {
    fn plan(&mut self, _state: &TurnState) -> Result<Vec<Value>, CollaboratorError> {
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}

/// Narrator returning fixed text in the session language.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockNarrator;

impl MockNarrator {
    /// The fixed narration for `language`. Anything but `en` gets Chinese.
    pub fn text_for(language: &str) -> &'static str {
        match language {
            "en" => "(mock narration) You look around. Nothing stirs yet.",
            _ => "（模拟旁白）你环顾四周，一切暂时平静。",
        }
    }
}

impl Narrator for MockNarrator {
    fn narrate(&mut self, state: &TurnState) -> Result<String, CollaboratorError> {
        Ok(Self::text_for(&state.language).to_string())
    }
}
