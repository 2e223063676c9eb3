//! In-memory card index with keyword retrieval.

use std::collections::{BTreeSet, HashMap};

use super::Card;

/// Cards by id, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct CardIndex {
    cards: Vec<Card>,
    positions: HashMap<String, usize>,
}

impl CardIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index from cards in order.
    pub fn from_cards(cards: impl IntoIterator<Item = Card>) -> Self {
        let mut index = Self::new();
        for card in cards {
            index.insert(card);
        }
        index
    }

    /// Add a card. A card with an id already present replaces the earlier one in place.
    pub fn insert(&mut self, card: Card) {
        match self.positions.get(&card.id) {
            Some(&pos) => self.cards[pos] = card,
            None => {
                self.positions.insert(card.id.clone(), self.cards.len());
                self.cards.push(card);
            }
        }
    }

    /// Get a card by id.
    pub fn get(&self, id: &str) -> Option<&Card> {
        self.positions.get(id).map(|&pos| &self.cards[pos])
    }

    /// Check whether a card with `id` exists.
    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Declared type of an entity.
    pub fn entity_type(&self, id: &str) -> Option<&str> {
        self.get(id).map(|c| c.card_type.as_str())
    }

    /// Map of every entity id to its declared type.
    pub fn entity_types(&self) -> HashMap<String, String> {
        self.cards
            .iter()
            .map(|c| (c.id.clone(), c.card_type.clone()))
            .collect()
    }

    /// All cards in index order.
    pub fn all(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }

    /// Cards of the given type, in index order.
    pub fn by_type(&self, card_type: &str) -> Vec<&Card> {
        self.cards.iter().filter(|c| c.card_type == card_type).collect()
    }

    /// Cards carrying `tag`, in index order.
    pub fn by_tag(&self, tag: &str) -> Vec<&Card> {
        self.cards.iter().filter(|c| c.has_tag(tag)).collect()
    }

    /// Number of indexed cards.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Check whether the index holds no cards.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Top `k` cards by keyword overlap with `query`.
    ///
    /// A blank query returns the first `k` cards. Cards scoring zero are dropped and
    /// ties keep index order.
    pub fn search(&self, query: &str, k: usize) -> Vec<&Card> {
        if query.trim().is_empty() {
            return self.cards.iter().take(k).collect();
        }

        let terms: BTreeSet<String> = query.split_whitespace().map(str::to_lowercase).collect();

        let mut scored: Vec<(usize, &Card)> = self
            .cards
            .iter()
            .map(|card| (card.keyword_score(terms.iter().map(String::as_str)), card))
            .filter(|(score, _)| *score > 0)
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().take(k).map(|(_, card)| card).collect()
    }
}
