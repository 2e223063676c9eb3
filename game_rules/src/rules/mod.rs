//! Relation constraints and derived-action rules.
//!
//! A [`RuleConfig`] is loaded once per session and never mutated. The
//! [`RuleEngine`] checks op batches against it and derives the actions the
//! current world state unlocks.

mod engine;

pub use engine::*;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::ConfigError;
use crate::world_state::Edge;

/// Constraint on one relation name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRule {
    #[serde(default)]
    pub subject_types: BTreeSet<String>,

    #[serde(default)]
    pub object_types: BTreeSet<String>,

    /// Maximum edges of this relation per subject. Zero means unlimited.
    #[serde(default)]
    pub max_per_subject: u32,
}

impl RelationRule {
    /// Create a rule allowing the given subject and object types, with no cap.
    pub fn new(
        subject_types: impl IntoIterator<Item = impl Into<String>>,
        object_types: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            subject_types: subject_types.into_iter().map(Into::into).collect(),
            object_types: object_types.into_iter().map(Into::into).collect(),
            max_per_subject: 0,
        }
    }

    /// Cap the number of edges per subject. Zero lifts the cap.
    pub fn with_max_per_subject(mut self, max: u32) -> Self {
        self.max_per_subject = max;
        self
    }

    /// Per-subject cap, if one is configured.
    pub fn limit(&self) -> Option<usize> {
        (self.max_per_subject > 0).then_some(self.max_per_subject as usize)
    }
}

/// One required edge. Omitted endpoints act as wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgePattern {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    pub relation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

impl EdgePattern {
    /// Check whether `edge` satisfies every field this pattern names.
    pub fn matches(&self, edge: &Edge) -> bool {
        edge.relation == self.relation
            && self.subject_id.as_ref().map_or(true, |s| *s == edge.subject_id)
            && self.object_id.as_ref().map_or(true, |o| *o == edge.object_id)
    }
}

/// One required attribute value, compared by exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrRequirement {
    pub entity_id: String,
    pub key: String,
    pub value: String,
}

/// Conditions of a derived rule. Every listed requirement must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub edges: Vec<EdgePattern>,
    #[serde(default)]
    pub attrs: Vec<AttrRequirement>,
}

/// Unlocks `allow_action` while `when` holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedRule {
    #[serde(default)]
    pub when: Condition,
    pub allow_action: String,
}

/// Declarative constraint model for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub relations: BTreeMap<String, RelationRule>,

    #[serde(default)]
    pub derived_rules: Vec<DerivedRule>,
}

impl RuleConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the constraint for `name`.
    pub fn with_relation(mut self, name: impl Into<String>, rule: RelationRule) -> Self {
        self.relations.insert(name.into(), rule);
        self
    }

    /// Append a derived rule.
    pub fn with_derived_rule(mut self, rule: DerivedRule) -> Self {
        self.derived_rules.push(rule);
        self
    }

    /// Look up the constraint for a relation.
    pub fn relation(&self, name: &str) -> Option<&RelationRule> {
        self.relations.get(name)
    }

    /// Parse a TOML configuration document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Parse a JSON configuration document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load from a `.toml` or `.json` document, chosen by extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            Some("json") => Self::from_json_str(&text),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[relations.at]
subject_types = ["character", "item"]
object_types = ["location"]
max_per_subject = 1

[relations.has]
subject_types = ["character"]
object_types = ["item"]

[[derived_rules]]
allow_action = "rest"
when.edges = [{ subject_id = "player", relation = "at", object_id = "tavern" }]

[[derived_rules]]
allow_action = "trade"
when.edges = [{ relation = "has" }]
when.attrs = [{ entity_id = "innkeeper", key = "mood", value = "friendly" }]
"#;

    #[test]
    fn test_parse_toml() {
        let config = RuleConfig::from_toml_str(SAMPLE).unwrap();

        let at = config.relation("at").unwrap();
        assert_eq!(at.limit(), Some(1));
        assert!(at.subject_types.contains("item"));

        let has = config.relation("has").unwrap();
        assert_eq!(has.limit(), None);

        assert_eq!(config.derived_rules.len(), 2);
        assert_eq!(config.derived_rules[1].when.edges[0].subject_id, None);
        assert_eq!(config.derived_rules[1].when.attrs[0].value, "friendly");
    }

    #[test]
    fn test_parse_json() {
        let config = RuleConfig::from_json_str(
            r#"{"relations": {"knows": {"subject_types": ["character"], "object_types": ["character"]}},
                "derived_rules": [{"when": {}, "allow_action": "look"}]}"#,
        )
        .unwrap();

        assert!(config.relation("knows").is_some());
        assert!(config.derived_rules[0].when.edges.is_empty());
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("rules.toml");
        std::fs::write(&toml_path, SAMPLE).unwrap();
        assert_eq!(RuleConfig::load(&toml_path).unwrap().relations.len(), 2);

        let yaml_path = dir.path().join("rules.yaml");
        std::fs::write(&yaml_path, "relations: {}").unwrap();
        assert!(matches!(
            RuleConfig::load(&yaml_path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_edge_pattern_wildcards() {
        let edge = Edge::new("player", "has", "lantern");

        let any_holder = EdgePattern {
            subject_id: None,
            relation: "has".to_string(),
            object_id: Some("lantern".to_string()),
        };
        assert!(any_holder.matches(&edge));

        let other = EdgePattern {
            subject_id: Some("wolf".to_string()),
            relation: "has".to_string(),
            object_id: None,
        };
        assert!(!other.matches(&edge));
    }
}
