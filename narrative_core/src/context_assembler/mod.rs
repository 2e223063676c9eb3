//! Context Assembler - gathers what a turn knows before planning.
//!
//! Retrieval works as follows:
//! 1. **Cards**: top-K cards by keyword overlap with the player input
//! 2. **Memories**: top-K memories from the external memory store
//! 3. **World facts**: the full contents of both stores, passed in by the caller
//! 4. **Actions**: derived actions the rule engine unlocks for those facts

use game_rules::{Card, CardIndex, RuleEngine, WorldFacts};
use serde::{Deserialize, Serialize};

use crate::collaborators::{MemoryEntry, MemoryStore};
use crate::config::Settings;
use crate::error::CollaboratorError;

/// How much context to retrieve per turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalConfig {
    /// Maximum cards returned by keyword search.
    pub top_k_cards: usize,

    /// Maximum memories requested from the memory store.
    pub top_k_memories: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k_cards: 6,
            top_k_memories: 4,
        }
    }
}

impl From<&Settings> for RetrievalConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            top_k_cards: settings.top_k_cards,
            top_k_memories: settings.top_k_memories,
        }
    }
}

/// Performs the retrieval step of a turn.
#[derive(Debug, Clone, Default)]
pub struct ContextAssembler {
    config: RetrievalConfig,
}

impl ContextAssembler {
    /// Create an assembler with the given limits.
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    /// The retrieval limits in use.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Build the context for `query` over an already-read world snapshot.
    pub fn assemble(
        &self,
        query: &str,
        cards: &CardIndex,
        memory: &dyn MemoryStore,
        engine: &RuleEngine,
        world_facts: WorldFacts,
    ) -> Result<RetrievedContext, CollaboratorError> {
        let cards: Vec<Card> = cards
            .search(query, self.config.top_k_cards)
            .into_iter()
            .cloned()
            .collect();
        let memories = memory.search(query, self.config.top_k_memories)?;
        let allowed_actions = engine.allowed_actions(&world_facts);

        tracing::debug!(
            cards = cards.len(),
            memories = memories.len(),
            edges = world_facts.edges.len(),
            actions = allowed_actions.len(),
            "assembled turn context"
        );

        Ok(RetrievedContext {
            cards,
            memories,
            world_facts,
            allowed_actions,
        })
    }
}

/// Everything retrieved for one turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub cards: Vec<Card>,
    pub memories: Vec<MemoryEntry>,
    pub world_facts: WorldFacts,
    pub allowed_actions: Vec<String>,
}

impl RetrievedContext {
    /// Format the context as a prompt string for planner implementations.
    pub fn to_prompt_string(&self) -> String {
        let mut prompt = String::new();

        if !self.cards.is_empty() {
            prompt.push_str("## Relevant Cards\n");
            for card in &self.cards {
                prompt.push_str(&format!("- {} ({})", card.id, card.card_type));
                if !card.tags.is_empty() {
                    let tags: Vec<&str> = card.tags.iter().map(String::as_str).collect();
                    prompt.push_str(&format!(" [{}]", tags.join(", ")));
                }
                prompt.push('\n');
            }
            prompt.push('\n');
        }

        if !self.world_facts.is_empty() {
            prompt.push_str("## World Facts\n");
            for edge in &self.world_facts.edges {
                prompt.push_str(&format!(
                    "- {} --{}--> {}\n",
                    edge.subject_id, edge.relation, edge.object_id
                ));
            }
            for (entity, attrs) in &self.world_facts.attrs {
                for (key, value) in attrs {
                    prompt.push_str(&format!("- {entity}.{key} = {value}\n"));
                }
            }
            prompt.push('\n');
        }

        if !self.memories.is_empty() {
            prompt.push_str("## Memories\n");
            for memory in &self.memories {
                prompt.push_str(&format!("- {}\n", memory.text));
            }
            prompt.push('\n');
        }

        if !self.allowed_actions.is_empty() {
            prompt.push_str("## Allowed Actions\n");
            for action in &self.allowed_actions {
                prompt.push_str(&format!("- {action}\n"));
            }
            prompt.push('\n');
        }

        prompt
    }
}
