//! Rule engine - validates op batches and derives allowed actions.

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use super::{DerivedRule, RuleConfig};
use crate::entities::CardIndex;
use crate::error::OpsError;
use crate::ops::{decode_batch, EdgeOp, Op, OpSource};
use crate::world_state::{AttrMap, Edge, WorldFacts};

/// Per-op problems that drop the op (or, for a bad batch, every op).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("{0}")]
    InvalidOpsBatch(OpsError),

    #[error("unknown entity '{entity_id}' in {op}")]
    UnknownEntity { op: &'static str, entity_id: String },

    #[error("relation not allowed: {subject_id} -({relation})-> {object_id}: {reason}")]
    RelationNotAllowed {
        subject_id: String,
        relation: String,
        object_id: String,
        reason: String,
    },
}

/// Non-fatal findings. The ops involved still proceed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleWarning {
    #[error(
        "auto-removed {evicted} existing '{relation}' edge(s) of {subject_id} to make room for -> {object_id}"
    )]
    CardinalityOverflow {
        subject_id: String,
        relation: String,
        object_id: String,
        evicted: usize,
    },
}

/// Result of validating one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationOutcome {
    pub accepted: Vec<Op>,
    pub errors: Vec<RuleError>,
    pub warnings: Vec<RuleWarning>,
}

impl ValidationOutcome {
    /// True when nothing was dropped or repaired.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// Checks ops against a [`RuleConfig`] and the declared entity types.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    config: RuleConfig,
    entity_types: HashMap<String, String>,
}

impl RuleEngine {
    /// Create an engine over `entity_id -> declared type`.
    pub fn new(config: RuleConfig, entity_types: HashMap<String, String>) -> Self {
        Self {
            config,
            entity_types,
        }
    }

    /// Create an engine whose known entities are the indexed cards.
    pub fn from_cards(config: RuleConfig, cards: &CardIndex) -> Self {
        Self::new(config, cards.entity_types())
    }

    /// The configuration this engine checks against.
    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    /// Check whether `entity_id` is declared by some card.
    pub fn is_known_entity(&self, entity_id: &str) -> bool {
        self.entity_types.contains_key(entity_id)
    }

    /// Decode a loose batch, then validate it.
    ///
    /// A structural failure discards the entire batch: nothing is accepted and a
    /// single [`RuleError::InvalidOpsBatch`] is reported.
    pub fn validate_batch(&self, items: &[Value], current_edges: &[Edge]) -> ValidationOutcome {
        match decode_batch(items) {
            Ok(ops) => self.validate_ops(ops, current_edges),
            Err(e) => ValidationOutcome {
                accepted: Vec::new(),
                errors: vec![RuleError::InvalidOpsBatch(e)],
                warnings: Vec::new(),
            },
        }
    }

    /// Validate and repair a decoded batch, in order.
    ///
    /// Cardinality is counted against `current_edges` only, never against other
    /// ops in the same batch. An `AddEdge` that would overflow its relation's
    /// per-subject cap is kept and preceded by a `RemoveEdge` for every existing
    /// edge of that subject and relation.
    pub fn validate_ops(&self, ops: Vec<Op>, current_edges: &[Edge]) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();

        for op in ops {
            match &op {
                Op::AddEdge(edge) => {
                    if let Err(e) = self.check_endpoints("AddEdge", edge) {
                        outcome.errors.push(e);
                        continue;
                    }
                    if let Err(e) = self.check_relation(edge) {
                        outcome.errors.push(e);
                        continue;
                    }

                    let evicted = self.overflow_edges(edge, current_edges);
                    if !evicted.is_empty() {
                        tracing::debug!(
                            subject = %edge.subject_id,
                            relation = %edge.relation,
                            evicted = evicted.len(),
                            "evicting edges over cardinality cap"
                        );
                        outcome.warnings.push(RuleWarning::CardinalityOverflow {
                            subject_id: edge.subject_id.clone(),
                            relation: edge.relation.clone(),
                            object_id: edge.object_id.clone(),
                            evicted: evicted.len(),
                        });
                        outcome.accepted.extend(evicted.into_iter().map(|existing| {
                            Op::RemoveEdge(
                                EdgeOp::new(
                                    existing.subject_id.clone(),
                                    existing.relation.clone(),
                                    existing.object_id.clone(),
                                )
                                .with_confidence(existing.confidence)
                                .with_source(OpSource::RuleEngine),
                            )
                        }));
                    }
                }
                Op::RemoveEdge(edge) => {
                    if let Err(e) = self.check_endpoints("RemoveEdge", edge) {
                        outcome.errors.push(e);
                        continue;
                    }
                }
                Op::SetAttr(attr) => {
                    if !self.is_known_entity(&attr.entity_id) {
                        outcome.errors.push(RuleError::UnknownEntity {
                            op: "SetAttr",
                            entity_id: attr.entity_id.clone(),
                        });
                        continue;
                    }
                }
                Op::LogMemory(_) => {}
            }
            outcome.accepted.push(op);
        }

        outcome
    }

    /// Actions unlocked by the derived rules, in configuration order.
    ///
    /// Two rules naming the same action both contribute it.
    pub fn allowed_actions(&self, facts: &WorldFacts) -> Vec<String> {
        self.config
            .derived_rules
            .iter()
            .filter(|rule| !rule.allow_action.is_empty())
            .filter(|rule| rule_matches(rule, &facts.edges, &facts.attrs))
            .map(|rule| rule.allow_action.clone())
            .collect()
    }

    fn check_endpoints(&self, op: &'static str, edge: &EdgeOp) -> Result<(), RuleError> {
        for id in [&edge.subject_id, &edge.object_id] {
            if !self.is_known_entity(id) {
                return Err(RuleError::UnknownEntity {
                    op,
                    entity_id: id.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_relation(&self, edge: &EdgeOp) -> Result<(), RuleError> {
        let not_allowed = |reason: String| RuleError::RelationNotAllowed {
            subject_id: edge.subject_id.clone(),
            relation: edge.relation.clone(),
            object_id: edge.object_id.clone(),
            reason,
        };

        let Some(rule) = self.config.relation(&edge.relation) else {
            return Err(not_allowed("no rule configured for relation".to_string()));
        };

        let subject_type = self.entity_type(&edge.subject_id);
        if !rule.subject_types.contains(subject_type) {
            return Err(not_allowed(format!("subject type '{}' not allowed", subject_type)));
        }

        let object_type = self.entity_type(&edge.object_id);
        if !rule.object_types.contains(object_type) {
            return Err(not_allowed(format!("object type '{}' not allowed", object_type)));
        }

        Ok(())
    }

    fn entity_type(&self, entity_id: &str) -> &str {
        self.entity_types
            .get(entity_id)
            .map(String::as_str)
            .unwrap_or_default()
    }

    fn overflow_edges<'a>(&self, edge: &EdgeOp, current_edges: &'a [Edge]) -> Vec<&'a Edge> {
        let Some(limit) = self
            .config
            .relation(&edge.relation)
            .and_then(|rule| rule.limit())
        else {
            return Vec::new();
        };

        let existing: Vec<&Edge> = current_edges
            .iter()
            .filter(|e| e.subject_id == edge.subject_id && e.relation == edge.relation)
            .collect();

        if existing.len() >= limit {
            existing
        } else {
            Vec::new()
        }
    }
}

fn rule_matches(rule: &DerivedRule, edges: &[Edge], attrs: &AttrMap) -> bool {
    let edges_hold = rule
        .when
        .edges
        .iter()
        .all(|pattern| edges.iter().any(|edge| pattern.matches(edge)));

    let attrs_hold = rule.when.attrs.iter().all(|req| {
        attrs
            .get(&req.entity_id)
            .and_then(|entity| entity.get(&req.key))
            .is_some_and(|value| *value == req.value)
    });

    edges_hold && attrs_hold
}
