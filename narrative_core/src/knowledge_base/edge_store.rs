//! SQLite-backed edge store.

use game_rules::{CardIndex, Edge, OpSource};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Confidence of edges seeded from card initial relations.
pub const BOOTSTRAP_CONFIDENCE: f64 = 0.9;

/// Relation-edge store over one SQLite file.
///
/// Every call opens its own connection and commits before returning.
#[derive(Debug, Clone)]
pub struct EdgeStore {
    db_path: PathBuf,
}

impl EdgeStore {
    /// Open (creating if needed) the store at `db_path`.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self { db_path };
        store.connect()?.execute(
            "CREATE TABLE IF NOT EXISTS edges (
                sub TEXT NOT NULL,
                rel TEXT NOT NULL,
                obj TEXT NOT NULL,
                ts INTEGER NOT NULL,
                confidence REAL NOT NULL,
                source TEXT NOT NULL
            )",
            [],
        )?;
        Ok(store)
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        Ok(Connection::open(&self.db_path)?)
    }

    /// Insert one edge stamped with the current time. Duplicates are allowed.
    pub fn add_edge(
        &self,
        subject_id: &str,
        relation: &str,
        object_id: &str,
        confidence: f64,
        source: OpSource,
    ) -> Result<(), StoreError> {
        let ts = chrono::Utc::now().timestamp();
        self.connect()?.execute(
            "INSERT INTO edges (sub, rel, obj, ts, confidence, source) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![subject_id, relation, object_id, ts, confidence, source.as_str()],
        )?;
        Ok(())
    }

    /// Delete every row matching the triple exactly. Returns the number removed.
    pub fn remove_edge(
        &self,
        subject_id: &str,
        relation: &str,
        object_id: &str,
    ) -> Result<usize, StoreError> {
        let removed = self.connect()?.execute(
            "DELETE FROM edges WHERE sub = ?1 AND rel = ?2 AND obj = ?3",
            params![subject_id, relation, object_id],
        )?;
        Ok(removed)
    }

    /// All edges in insertion order.
    pub fn all_edges(&self) -> Result<Vec<Edge>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT sub, rel, obj, ts, confidence, source FROM edges ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let source = OpSource::from(row.get::<_, String>(5)?);
            Ok(Edge::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)
                .with_timestamp(row.get(3)?)
                .with_confidence(row.get(4)?)
                .with_source(source))
        })?;

        let mut edges = Vec::new();
        for edge in rows {
            edges.push(edge?);
        }
        Ok(edges)
    }

    /// Check whether the store holds no edges.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        let count: i64 = self
            .connect()?
            .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok(count == 0)
    }

    /// Seed every card's initial relations, only when the store is empty.
    ///
    /// Returns the number of edges inserted. Seeded edges bypass the rule engine.
    pub fn bootstrap(&self, cards: &CardIndex) -> Result<usize, StoreError> {
        if !self.is_empty()? {
            return Ok(0);
        }

        let mut seeded = 0;
        for card in cards.all() {
            for rel in &card.initial_relations {
                self.add_edge(
                    &rel.subject_id,
                    &rel.relation,
                    &rel.object_id,
                    BOOTSTRAP_CONFIDENCE,
                    OpSource::Bootstrap,
                )?;
                seeded += 1;
            }
        }
        if seeded > 0 {
            tracing::info!(seeded, "bootstrapped edge store from card initial relations");
        }
        Ok(seeded)
    }
}
