//! In-process memory store with keyword-overlap search.

use std::collections::BTreeSet;

use super::{MemoryEntry, MemoryStore};
use crate::error::CollaboratorError;

/// Keyword-overlap memory store kept in process.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMemoryStore {
    entries: Vec<MemoryEntry>,
}

impl InMemoryMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn score(entry: &MemoryEntry, terms: &[String]) -> usize {
        let mut haystack = entry.text.to_lowercase();
        for word in entry.tags.iter().chain(&entry.entities) {
            haystack.push(' ');
            haystack.push_str(&word.to_lowercase());
        }
        terms.iter().filter(|t| haystack.contains(t.as_str())).count()
    }
}

impl MemoryStore for InMemoryMemoryStore {
    fn add_memory(
        &mut self,
        text: &str,
        tags: &BTreeSet<String>,
        entities: &BTreeSet<String>,
    ) -> Result<MemoryEntry, CollaboratorError> {
        let entry = MemoryEntry::new(text)
            .with_tags(tags)
            .with_entities(entities);
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Entries sharing the most query terms first; ties keep insertion order.
    fn search(&self, query: &str, k: usize) -> Result<Vec<MemoryEntry>, CollaboratorError> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, &MemoryEntry)> = self
            .entries
            .iter()
            .map(|e| (Self::score(e, &terms), e))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored.into_iter().take(k).map(|(_, e)| e.clone()).collect())
    }
}
