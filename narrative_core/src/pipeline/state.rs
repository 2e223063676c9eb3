//! Per-turn state threaded through the pipeline stages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use game_rules::Op;

use crate::context_assembler::RetrievedContext;

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One line of the persisted chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a player message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a narration message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Which path produced the draft batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Admin,
    Planner,
}

/// Everything one turn reads and produces.
///
/// Only the chat history and the store contents outlive the turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnState {
    pub turn_id: u64,
    pub player_input: String,
    pub language: String,

    /// Full history before this turn's messages are appended.
    pub chat_history: Vec<ChatMessage>,

    /// Trimmed window filled by Ingest.
    pub recent_messages: Vec<ChatMessage>,

    pub context: RetrievedContext,
    pub plan_source: Option<PlanSource>,
    pub draft_ops: Vec<Value>,
    pub overlay_ops: Vec<Value>,
    pub validated_ops: Vec<Op>,
    pub narration: String,

    /// Dropped ops, discarded batches and collaborator failures.
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl TurnState {
    /// Create the state for one turn.
    pub fn new(turn_id: u64, player_input: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            turn_id,
            player_input: player_input.into(),
            language: language.into(),
            ..Default::default()
        }
    }

    /// Attach the history as it stood before this turn.
    pub fn with_chat_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.chat_history = history;
        self
    }

    /// Actions the rule engine unlocked during retrieval.
    pub fn allowed_actions(&self) -> &[String] {
        &self.context.allowed_actions
    }
}
