//! Op model - the typed mutation instructions produced each turn.
//!
//! Ops arrive as loose JSON values (from a planner, overlay documents or the admin
//! parser) and are decoded as a single unit: one bad element voids the whole batch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::OpsError;

/// Confidence used when an edge op does not state one.
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

/// Who produced an op. Carried through to the stores for audit.
///
/// Any string is accepted on the wire; names outside the known set are kept
/// verbatim in [`OpSource::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OpSource {
    /// Slash command typed by an administrator.
    Admin,
    /// Content overlay applied every turn.
    Overlay,
    /// External planner output.
    #[default]
    Planner,
    /// Compensating op synthesized by the rule engine.
    RuleEngine,
    /// Initial relations seeded from cards.
    Bootstrap,
    /// Any other producer label, such as `llm` or `mock`.
    Other(String),
}

impl OpSource {
    /// The wire name of this source.
    pub fn as_str(&self) -> &str {
        match self {
            OpSource::Admin => "admin",
            OpSource::Overlay => "overlay",
            OpSource::Planner => "planner",
            OpSource::RuleEngine => "rule_engine",
            OpSource::Bootstrap => "bootstrap",
            OpSource::Other(name) => name,
        }
    }
}

impl fmt::Display for OpSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for OpSource {
    fn from(s: &str) -> Self {
        match s {
            "admin" => OpSource::Admin,
            "overlay" => OpSource::Overlay,
            "planner" => OpSource::Planner,
            "rule_engine" => OpSource::RuleEngine,
            "bootstrap" => OpSource::Bootstrap,
            other => OpSource::Other(other.to_string()),
        }
    }
}

impl From<String> for OpSource {
    fn from(s: String) -> Self {
        OpSource::from(s.as_str())
    }
}

impl From<OpSource> for String {
    fn from(source: OpSource) -> Self {
        match source {
            OpSource::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

/// Payload shared by `AddEdge` and `RemoveEdge`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeOp {
    pub subject_id: String,
    pub relation: String,
    pub object_id: String,

    /// Confidence in [0, 1].
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    #[serde(default)]
    pub source: OpSource,
}

impl EdgeOp {
    /// Create an edge op with default confidence and planner source.
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
        }
    }

    /// Set the confidence, clamped to [0, 1].
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    /// Set who produced the op.
    pub fn with_source(mut self, source: OpSource) -> Self {
        self.source = source;
        self
    }
}

/// Payload of `SetAttr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetAttr {
    pub entity_id: String,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub source: OpSource,
}

impl SetAttr {
    /// Create an attribute write with planner source.
    pub fn new(
        entity_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            key: key.into(),
            value: value.into(),
            source: OpSource::default(),
        }
    }

    /// Set who produced the op.
    pub fn with_source(mut self, source: OpSource) -> Self {
        self.source = source;
        self
    }
}

/// Payload of `LogMemory`. Consumed by the memory store only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMemory {
    pub text: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub entities: BTreeSet<String>,
    #[serde(default)]
    pub source: OpSource,
}

impl LogMemory {
    /// Create a memory entry with no tags or entities.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tags: BTreeSet::new(),
            entities: BTreeSet::new(),
            source: OpSource::default(),
        }
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Add a referenced entity id.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entities.insert(entity.into());
        self
    }

    /// Set who produced the op.
    pub fn with_source(mut self, source: OpSource) -> Self {
        self.source = source;
        self
    }
}

/// One typed mutation instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Op {
    AddEdge(EdgeOp),
    RemoveEdge(EdgeOp),
    SetAttr(SetAttr),
    LogMemory(LogMemory),
}

impl Op {
    /// The wire tag of this op.
    pub fn kind(&self) -> &'static str {
        match self {
            Op::AddEdge(_) => "AddEdge",
            Op::RemoveEdge(_) => "RemoveEdge",
            Op::SetAttr(_) => "SetAttr",
            Op::LogMemory(_) => "LogMemory",
        }
    }

    /// Who produced this op.
    pub fn source(&self) -> &OpSource {
        match self {
            Op::AddEdge(e) | Op::RemoveEdge(e) => &e.source,
            Op::SetAttr(a) => &a.source,
            Op::LogMemory(m) => &m.source,
        }
    }

    /// Bring numeric fields back inside their declared bounds.
    pub fn normalized(mut self) -> Self {
        if let Op::AddEdge(edge) | Op::RemoveEdge(edge) = &mut self {
            edge.confidence = clamp_confidence(edge.confidence);
        }
        self
    }

    /// Decode a single loose value.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Op::deserialize(value).map(Op::normalized)
    }

    /// Encode back to the wire shape.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        DEFAULT_CONFIDENCE
    }
}

/// Decode a whole batch. Any malformed element rejects every element.
pub fn decode_batch(items: &[Value]) -> Result<Vec<Op>, OpsError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            Op::from_value(item).map_err(|e| OpsError::InvalidOpsBatch {
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// The `{"ops": [...]}` document exchanged with planners and overlay files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsDocument {
    #[serde(default)]
    pub ops: Vec<Value>,
}

impl OpsDocument {
    /// Parse a strict `{"ops": [...]}` document.
    pub fn from_json(text: &str) -> Result<Self, OpsError> {
        serde_json::from_str(text).map_err(|e| OpsError::MalformedDocument(e.to_string()))
    }

    /// Read planner output, falling back to an empty batch when it is not a document.
    pub fn parse_lenient(text: &str) -> Vec<Value> {
        match Self::from_json(text.trim()) {
            Ok(doc) => doc.ops,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable planner output");
                Vec::new()
            }
        }
    }

    /// Decode every item of the document as one batch.
    pub fn decode(&self) -> Result<Vec<Op>, OpsError> {
        decode_batch(&self.ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_add_edge_defaults() {
        let ops = decode_batch(&[json!({
            "type": "AddEdge",
            "subject_id": "player",
            "relation": "at",
            "object_id": "tavern"
        })])
        .unwrap();

        match &ops[0] {
            Op::AddEdge(edge) => {
                assert_eq!(edge.subject_id, "player");
                assert_eq!(edge.confidence, DEFAULT_CONFIDENCE);
                assert_eq!(edge.source, OpSource::Planner);
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn test_confidence_is_clamped() {
        let ops = decode_batch(&[
            json!({"type": "AddEdge", "subject_id": "a", "relation": "r", "object_id": "b", "confidence": 3.5}),
            json!({"type": "RemoveEdge", "subject_id": "a", "relation": "r", "object_id": "b", "confidence": -1}),
        ])
        .unwrap();

        assert!(matches!(&ops[0], Op::AddEdge(e) if e.confidence == 1.0));
        assert!(matches!(&ops[1], Op::RemoveEdge(e) if e.confidence == 0.0));
    }

    #[test]
    fn test_unknown_type_rejects_whole_batch() {
        let result = decode_batch(&[
            json!({"type": "SetAttr", "entity_id": "player", "key": "hp", "value": "10"}),
            json!({"type": "Teleport", "subject_id": "player"}),
        ]);

        assert!(matches!(result, Err(OpsError::InvalidOpsBatch { index: 1, .. })));
    }

    #[test]
    fn test_missing_field_rejects_batch() {
        let result = decode_batch(&[json!({"type": "SetAttr", "entity_id": "player", "key": "hp"})]);
        assert!(matches!(result, Err(OpsError::InvalidOpsBatch { index: 0, .. })));
    }

    #[test]
    fn test_log_memory_sets() {
        let ops = decode_batch(&[json!({
            "type": "LogMemory",
            "text": "the bell tolls",
            "tags": ["omen", "omen", "bell"],
            "source": "overlay"
        })])
        .unwrap();

        match &ops[0] {
            Op::LogMemory(m) => {
                assert_eq!(m.tags.len(), 2);
                assert!(m.entities.is_empty());
                assert_eq!(m.source, OpSource::Overlay);
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn test_unknown_source_is_kept_verbatim() {
        let ops = decode_batch(&[
            json!({"type": "SetAttr", "entity_id": "a", "key": "k", "value": "v", "source": "llm"}),
            json!({"type": "LogMemory", "text": "t", "source": "overlay"}),
        ])
        .unwrap();

        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].source(), &OpSource::Other("llm".to_string()));
        assert_eq!(ops[0].to_value().unwrap()["source"], "llm");
        assert_eq!(ops[1].source(), &OpSource::Overlay);
    }

    #[test]
    fn test_non_string_source_rejects_batch() {
        let result = decode_batch(&[json!({
            "type": "SetAttr", "entity_id": "a", "key": "k", "value": "v", "source": 7
        })]);
        assert!(matches!(result, Err(OpsError::InvalidOpsBatch { index: 0, .. })));
    }

    #[test]
    fn test_wire_shape() {
        let op = Op::AddEdge(
            EdgeOp::new("player", "at", "tavern")
                .with_confidence(1.0)
                .with_source(OpSource::Admin),
        );
        let value = op.to_value().unwrap();

        assert_eq!(value["type"], "AddEdge");
        assert_eq!(value["source"], "admin");
        assert_eq!(Op::from_value(&value).unwrap(), op);
    }

    #[test]
    fn test_parse_lenient() {
        let ops = OpsDocument::parse_lenient(r#"{"ops": [{"type": "LogMemory", "text": "hi"}]}"#);
        assert_eq!(ops.len(), 1);

        assert!(OpsDocument::parse_lenient("Sure! Here are the ops:").is_empty());
        assert!(OpsDocument::parse_lenient("{}").is_empty());
    }

    #[test]
    fn test_source_round_trip() {
        for source in [
            OpSource::Admin,
            OpSource::Overlay,
            OpSource::Planner,
            OpSource::RuleEngine,
            OpSource::Bootstrap,
            OpSource::Other("mock".to_string()),
        ] {
            assert_eq!(OpSource::from(source.as_str()), source);
        }
    }
}
