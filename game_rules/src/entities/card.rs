//! Card definitions.

use serde::{Deserialize, Serialize};

/// A relation a card declares as true at the start of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialRelation {
    pub subject_id: String,
    pub relation: String,
    pub object_id: String,
}

/// Index metadata of one content card. The card body is not kept here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,

    /// Entity type checked against relation constraints (e.g. "character", "location").
    #[serde(rename = "type")]
    pub card_type: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub initial_relations: Vec<InitialRelation>,

    #[serde(default)]
    pub hooks: Vec<String>,
}

impl Card {
    /// Create a new card with the given id and type.
    pub fn new(id: impl Into<String>, card_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            card_type: card_type.into(),
            tags: Vec::new(),
            initial_relations: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add several tags.
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Declare an initial relation seeded into an empty edge store.
    pub fn with_initial_relation(
        mut self,
        subject_id: impl Into<String>,
        relation: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Self {
        self.initial_relations.push(InitialRelation {
            subject_id: subject_id.into(),
            relation: relation.into(),
            object_id: object_id.into(),
        });
        self
    }

    /// Check whether the card carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Number of `terms` found in the card's id, type and tags.
    ///
    /// Terms are expected lowercase; matching is substring-based.
    pub fn keyword_score<'a>(&self, terms: impl IntoIterator<Item = &'a str>) -> usize {
        let haystack = format!("{} {} {}", self.id, self.card_type, self.tags.join(" ")).to_lowercase();
        terms.into_iter().filter(|t| haystack.contains(t)).count()
    }
}
