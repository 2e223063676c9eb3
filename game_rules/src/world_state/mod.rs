//! World facts - the relation edges and entity attributes the stores hold.
//!
//! These are plain data; persistence lives in `narrative_core`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::ops::{OpSource, DEFAULT_CONFIDENCE};

/// Attributes grouped by entity: `entity -> key -> value`.
pub type AttrMap = BTreeMap<String, BTreeMap<String, String>>;

/// A directed, labeled fact `(subject, relation, object)` with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub subject_id: String,
    pub relation: String,
    pub object_id: String,
    pub confidence: f64,
    pub source: OpSource,
    /// Unix seconds at insertion.
    pub timestamp: i64,
}

impl Edge {
    /// Create an edge with default confidence and planner source.
    pub fn new(
        subject_id: impl Into<String>,
        relation: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            relation: relation.into(),
            object_id: object_id.into(),
            confidence: DEFAULT_CONFIDENCE,
            source: OpSource::default(),
            timestamp: 0,
        }
    }

    /// Set the confidence, as stored.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Set who produced the edge.
    pub fn with_source(mut self, source: OpSource) -> Self {
        self.source = source;
        self
    }

    /// Set the insertion time in Unix seconds.
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Exact match on the `(subject, relation, object)` triple only.
    pub fn matches(&self, subject_id: &str, relation: &str, object_id: &str) -> bool {
        self.subject_id == subject_id && self.relation == relation && self.object_id == object_id
    }
}

/// Full snapshot of both stores at one point in a turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldFacts {
    pub attrs: AttrMap,
    pub edges: Vec<Edge>,
}

impl WorldFacts {
    /// Create a snapshot from both stores' contents.
    pub fn new(attrs: AttrMap, edges: Vec<Edge>) -> Self {
        Self { attrs, edges }
    }

    /// Look up one attribute value.
    pub fn attr(&self, entity_id: &str, key: &str) -> Option<&str> {
        self.attrs
            .get(entity_id)
            .and_then(|attrs| attrs.get(key))
            .map(String::as_str)
    }

    /// Edges leaving `subject_id` with the given relation.
    pub fn edges_from<'a>(
        &'a self,
        subject_id: &'a str,
        relation: &'a str,
    ) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.subject_id == subject_id && e.relation == relation)
    }

    /// Every entity that has an attribute or appears at either end of an edge.
    pub fn entity_ids(&self) -> BTreeSet<&str> {
        let mut ids: BTreeSet<&str> = self.attrs.keys().map(String::as_str).collect();
        for edge in &self.edges {
            ids.insert(&edge.subject_id);
            ids.insert(&edge.object_id);
        }
        ids
    }

    /// Check whether neither store holds anything.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.edges.is_empty()
    }
}
