//! Turn pipeline - one strictly linear pass from player input to checkpoint.
//!
//! ```text
//! Ingest -> LoadOverlays -> RetrieveContext -> PlanOps -> ValidateOps
//!        -> ApplyUpdates -> Narrate -> Checkpoint
//! ```
//!
//! The only fork is inside PlanOps: a recognised admin command replaces the
//! planner for that turn. Rule violations and collaborator failures are
//! collected on the [`TurnState`]; only store, memory and export failures end
//! a turn early.

mod state;

pub use state::*;

use std::collections::BTreeSet;
use std::path::PathBuf;

use game_rules::{parse_admin_command, CardIndex, Op, RuleConfig, RuleEngine, WorldFacts};

use crate::collaborators::{Collaborators, MemoryStore};
use crate::config::{Settings, SlotPaths};
use crate::context_assembler::{ContextAssembler, RetrievalConfig};
use crate::error::{PipelineError, StoreError};
use crate::knowledge_base::EdgeStore;
use crate::overlay::OverlayLoader;
use crate::snapshot::write_snapshot;
use crate::world_store::AttributeStore;

/// Tag attached to the memory written at the end of every turn.
pub const TURN_SUMMARY_TAG: &str = "turn_summary";

/// The eight stages of a turn, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Ingest,
    LoadOverlays,
    RetrieveContext,
    PlanOps,
    ValidateOps,
    ApplyUpdates,
    Narrate,
    Checkpoint,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 8] = [
        Stage::Ingest,
        Stage::LoadOverlays,
        Stage::RetrieveContext,
        Stage::PlanOps,
        Stage::ValidateOps,
        Stage::ApplyUpdates,
        Stage::Narrate,
        Stage::Checkpoint,
    ];

    /// The following stage, `None` after Checkpoint.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Ingest => Some(Stage::LoadOverlays),
            Stage::LoadOverlays => Some(Stage::RetrieveContext),
            Stage::RetrieveContext => Some(Stage::PlanOps),
            Stage::PlanOps => Some(Stage::ValidateOps),
            Stage::ValidateOps => Some(Stage::ApplyUpdates),
            Stage::ApplyUpdates => Some(Stage::Narrate),
            Stage::Narrate => Some(Stage::Checkpoint),
            Stage::Checkpoint => None,
        }
    }

    /// Stage name used in tracing spans.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::LoadOverlays => "load_overlays",
            Stage::RetrieveContext => "retrieve_context",
            Stage::PlanOps => "plan_ops",
            Stage::ValidateOps => "validate_ops",
            Stage::ApplyUpdates => "apply_updates",
            Stage::Narrate => "narrate",
            Stage::Checkpoint => "checkpoint",
        }
    }
}

/// The two persistent stores of a save slot plus its snapshot directory.
#[derive(Debug, Clone)]
pub struct WorldStores {
    pub edges: EdgeStore,
    pub attrs: AttributeStore,
    pub snapshot_dir: PathBuf,
}

impl WorldStores {
    /// Open (creating if needed) the stores of one save slot.
    pub fn open(paths: &SlotPaths) -> Result<Self, StoreError> {
        Ok(Self {
            edges: EdgeStore::open(&paths.edge_db_path)?,
            attrs: AttributeStore::open(&paths.attr_db_path)?,
            snapshot_dir: paths.snapshot_dir.clone(),
        })
    }

    /// Read both stores in full.
    pub fn world_facts(&self) -> Result<WorldFacts, StoreError> {
        Ok(WorldFacts::new(self.attrs.all_attrs()?, self.edges.all_edges()?))
    }
}

/// Runs turns against one session's stores and collaborators.
#[derive(Debug)]
pub struct TurnPipeline {
    settings: Settings,
    cards: CardIndex,
    engine: RuleEngine,
    stores: WorldStores,
    collaborators: Collaborators,
    assembler: ContextAssembler,
    overlays: OverlayLoader,
}

impl TurnPipeline {
    /// Create a pipeline over opened stores. The rule engine knows the indexed cards.
    pub fn new(
        settings: Settings,
        cards: CardIndex,
        rules: RuleConfig,
        stores: WorldStores,
        collaborators: Collaborators,
    ) -> Self {
        let engine = RuleEngine::from_cards(rules, &cards);
        let assembler = ContextAssembler::new(RetrievalConfig::from(&settings));
        Self {
            settings,
            cards,
            engine,
            stores,
            collaborators,
            assembler,
            overlays: OverlayLoader::default(),
        }
    }

    /// Content roots searched for overlays, base content first.
    pub fn with_overlay_roots(mut self, roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.overlays = OverlayLoader::new(roots);
        self
    }

    /// The settings in effect.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Mutable settings; changes apply to later turns.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// The card index.
    pub fn cards(&self) -> &CardIndex {
        &self.cards
    }

    /// The rule engine.
    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// The stores of this save slot.
    pub fn stores(&self) -> &WorldStores {
        &self.stores
    }

    /// The memory store collaborator.
    pub fn memory(&self) -> &dyn MemoryStore {
        self.collaborators.memory.as_ref()
    }

    /// Read both stores in full.
    pub fn world_facts(&self) -> Result<WorldFacts, StoreError> {
        self.stores.world_facts()
    }

    /// Run all eight stages on `state`.
    ///
    /// The caller owns the turn counter; the pipeline never changes `turn_id`.
    pub fn run(&mut self, state: &mut TurnState) -> Result<(), PipelineError> {
        let span = tracing::info_span!("turn", turn_id = state.turn_id);
        let _enter = span.enter();

        let mut stage = Some(Stage::Ingest);
        while let Some(current) = stage {
            let _stage = tracing::debug_span!("stage", stage = current.name()).entered();
            self.run_stage(current, state)?;
            stage = current.next();
        }

        tracing::info!(
            applied = state.validated_ops.len(),
            errors = state.errors.len(),
            warnings = state.warnings.len(),
            "turn complete"
        );
        Ok(())
    }

    fn run_stage(&mut self, stage: Stage, state: &mut TurnState) -> Result<(), PipelineError> {
        match stage {
            Stage::Ingest => self.ingest(state),
            Stage::LoadOverlays => self.load_overlays(state),
            Stage::RetrieveContext => self.retrieve_context(state),
            Stage::PlanOps => self.plan_ops(state),
            Stage::ValidateOps => self.validate_ops(state),
            Stage::ApplyUpdates => self.apply_updates(state),
            Stage::Narrate => self.narrate(state),
            Stage::Checkpoint => self.checkpoint(state),
        }
    }

    fn ingest(&mut self, state: &mut TurnState) -> Result<(), PipelineError> {
        let keep = self.settings.max_recent_messages;
        let start = state.chat_history.len().saturating_sub(keep);
        state.recent_messages = state.chat_history[start..].to_vec();
        Ok(())
    }

    fn load_overlays(&mut self, state: &mut TurnState) -> Result<(), PipelineError> {
        state.overlay_ops = self.overlays.load()?;
        Ok(())
    }

    fn retrieve_context(&mut self, state: &mut TurnState) -> Result<(), PipelineError> {
        let facts = self.stores.world_facts()?;
        state.context = self
            .assembler
            .assemble(
                &state.player_input,
                &self.cards,
                self.collaborators.memory.as_ref(),
                &self.engine,
                facts,
            )
            .map_err(PipelineError::Memory)?;
        Ok(())
    }

    fn plan_ops(&mut self, state: &mut TurnState) -> Result<(), PipelineError> {
        let admin_ops = parse_admin_command(&state.player_input);
        if !admin_ops.is_empty() {
            state.draft_ops = admin_ops
                .iter()
                .map(Op::to_value)
                .collect::<Result<_, _>>()?;
            state.plan_source = Some(PlanSource::Admin);
            return Ok(());
        }

        state.plan_source = Some(PlanSource::Planner);
        match self.collaborators.planner.plan(state) {
            Ok(ops) => state.draft_ops = ops,
            Err(e) => {
                tracing::warn!(error = %e, "planner failed; continuing with an empty batch");
                state.errors.push(format!("planner failed: {e}"));
                state.draft_ops.clear();
            }
        }
        Ok(())
    }

    fn validate_ops(&mut self, state: &mut TurnState) -> Result<(), PipelineError> {
        let batch: Vec<_> = state
            .draft_ops
            .iter()
            .chain(&state.overlay_ops)
            .cloned()
            .collect();
        let outcome = self
            .engine
            .validate_batch(&batch, &state.context.world_facts.edges);

        for error in &outcome.errors {
            tracing::warn!(%error, "op rejected");
            state.errors.push(error.to_string());
        }
        for warning in &outcome.warnings {
            tracing::warn!(%warning, "op repaired");
            state.warnings.push(warning.to_string());
        }
        state.validated_ops = outcome.accepted;
        Ok(())
    }

    fn apply_updates(&mut self, state: &mut TurnState) -> Result<(), PipelineError> {
        let ts = i64::try_from(state.turn_id).unwrap_or(i64::MAX);

        for op in &state.validated_ops {
            tracing::debug!(kind = op.kind(), source = %op.source(), "applying op");
            match op {
                Op::AddEdge(e) => {
                    self.stores
                        .edges
                        .add_edge(&e.subject_id, &e.relation, &e.object_id, e.confidence, e.source.clone())?;
                }
                Op::RemoveEdge(e) => {
                    self.stores
                        .edges
                        .remove_edge(&e.subject_id, &e.relation, &e.object_id)?;
                }
                Op::SetAttr(a) => {
                    self.stores
                        .attrs
                        .set_attr(&a.entity_id, &a.key, &a.value, a.source.clone(), ts)?;
                }
                Op::LogMemory(m) => {
                    self.collaborators
                        .memory
                        .add_memory(&m.text, &m.tags, &m.entities)
                        .map_err(PipelineError::Memory)?;
                }
            }
        }
        Ok(())
    }

    fn narrate(&mut self, state: &mut TurnState) -> Result<(), PipelineError> {
        if self.settings.refresh_facts_before_narration {
            state.context.world_facts = self.stores.world_facts()?;
        }

        match self.collaborators.narrator.narrate(state) {
            Ok(text) => state.narration = text,
            Err(e) => {
                tracing::warn!(error = %e, "narrator failed");
                state.errors.push(format!("narrator failed: {e}"));
                state.narration.clear();
            }
        }
        Ok(())
    }

    fn checkpoint(&mut self, state: &mut TurnState) -> Result<(), PipelineError> {
        let facts = self.stores.world_facts()?;
        write_snapshot(&facts.attrs, &facts.edges, &self.stores.snapshot_dir)
            .map_err(PipelineError::Snapshot)?;

        let summary = format!(
            "Turn {}: {} -> {}",
            state.turn_id, state.player_input, state.narration
        );
        let tags = BTreeSet::from([TURN_SUMMARY_TAG.to_string()]);
        self.collaborators
            .memory
            .add_memory(&summary, &tags, &BTreeSet::new())
            .map_err(PipelineError::Memory)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{InMemoryMemoryStore, MockNarrator, Narrator, Planner, ScriptedPlanner};
    use crate::error::CollaboratorError;
    use game_rules::{Card, OpSource, RelationRule};
    use serde_json::{json, Value};

    struct FailingPlanner;

    impl Planner for FailingPlanner {
        fn plan(&mut self, _state: &TurnState) -> Result<Vec<Value>, CollaboratorError> {
            Err(CollaboratorError::Unavailable("planner", "offline".to_string()))
        }
    }

    struct EchoFactsNarrator;

    impl Narrator for EchoFactsNarrator {
        fn narrate(&mut self, state: &TurnState) -> Result<String, CollaboratorError> {
            Ok(format!("{} edges", state.context.world_facts.edges.len()))
        }
    }

    fn cards() -> CardIndex {
        CardIndex::from_cards([
            Card::new("player", "character"),
            Card::new("forest", "location"),
            Card::new("tavern", "location"),
        ])
    }

    fn rules() -> RuleConfig {
        RuleConfig::new().with_relation(
            "at",
            RelationRule::new(["character"], ["location"]).with_max_per_subject(1),
        )
    }

    fn pipeline(
        dir: &std::path::Path,
        settings: Settings,
        collaborators: Collaborators,
    ) -> TurnPipeline {
        let paths = SlotPaths::for_slot(dir, "slot");
        let stores = WorldStores::open(&paths).unwrap();
        TurnPipeline::new(settings, cards(), rules(), stores, collaborators)
    }

    #[test]
    fn test_stage_order() {
        let mut walked = vec![Stage::Ingest];
        while let Some(next) = walked.last().unwrap().next() {
            walked.push(next);
        }
        assert_eq!(walked, Stage::ALL.to_vec());
    }

    #[test]
    fn test_admin_command_bypasses_planner() {
        let dir = tempfile::tempdir().unwrap();
        let planner = ScriptedPlanner::new().with_batch(vec![json!({"type": "LogMemory", "text": "unused"})]);
        let mut p = pipeline(
            dir.path(),
            Settings::default(),
            Collaborators::new(planner, MockNarrator, InMemoryMemoryStore::new()),
        );

        let mut state = TurnState::new(1, "/teleport player tavern", "en");
        p.run(&mut state).unwrap();

        assert_eq!(state.plan_source, Some(PlanSource::Admin));
        assert!(state.errors.is_empty());
        let edges = p.world_facts().unwrap().edges;
        assert_eq!(edges.len(), 1);
        assert!(edges[0].matches("player", "at", "tavern"));
        assert_eq!(edges[0].source, OpSource::Admin);
        assert_eq!(edges[0].confidence, 1.0);
    }

    #[test]
    fn test_unknown_admin_verb_falls_through_to_planner() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = pipeline(dir.path(), Settings::default(), Collaborators::mock());

        let mut state = TurnState::new(1, "/dance player tavern", "en");
        p.run(&mut state).unwrap();

        assert_eq!(state.plan_source, Some(PlanSource::Planner));
        assert_eq!(state.validated_ops.len(), 1);
        assert_eq!(state.validated_ops[0].kind(), "LogMemory");
    }

    #[test]
    fn test_planner_failure_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = pipeline(
            dir.path(),
            Settings::default(),
            Collaborators::new(FailingPlanner, MockNarrator, InMemoryMemoryStore::new()),
        );

        let mut state = TurnState::new(3, "look", "en");
        p.run(&mut state).unwrap();

        assert!(state.draft_ops.is_empty());
        assert_eq!(state.errors.len(), 1);
        assert!(state.errors[0].contains("offline"));
        assert!(!state.narration.is_empty());
    }

    #[test]
    fn test_ingest_keeps_recent_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.max_recent_messages = 2;
        let mut p = pipeline(dir.path(), settings, Collaborators::mock());

        let history = (0..5).map(|i| ChatMessage::user(format!("m{i}"))).collect();
        let mut state = TurnState::new(1, "look", "en").with_chat_history(history);
        p.run(&mut state).unwrap();

        let recent: Vec<&str> = state.recent_messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(recent, vec!["m3", "m4"]);
    }

    #[test]
    fn test_narration_sees_pre_update_facts_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = pipeline(
            dir.path(),
            Settings::default(),
            Collaborators::new(ScriptedPlanner::new(), EchoFactsNarrator, InMemoryMemoryStore::new()),
        );
        let mut state = TurnState::new(1, "/teleport player forest", "en");
        p.run(&mut state).unwrap();
        assert_eq!(state.narration, "0 edges");

        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.refresh_facts_before_narration = true;
        let mut p = pipeline(
            dir.path(),
            settings,
            Collaborators::new(ScriptedPlanner::new(), EchoFactsNarrator, InMemoryMemoryStore::new()),
        );
        let mut state = TurnState::new(1, "/teleport player forest", "en");
        p.run(&mut state).unwrap();
        assert_eq!(state.narration, "1 edges");
    }

    #[test]
    fn test_checkpoint_writes_snapshot_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = pipeline(dir.path(), Settings::default(), Collaborators::mock());

        let mut state = TurnState::new(7, "/set player.mood calm", "en");
        p.run(&mut state).unwrap();

        let doc = std::fs::read_to_string(p.stores().snapshot_dir.join("player.md")).unwrap();
        assert_eq!(doc, "# player\n\n## Attributes\n- mood: calm\n");

        let summaries = p.memory().search("turn_summary", 5).unwrap();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].text.starts_with("Turn 7: /set player.mood calm -> "));
    }
}
