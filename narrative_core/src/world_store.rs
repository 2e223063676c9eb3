//! SQLite-backed entity attribute store. At most one row per `(entity, key)`.

use game_rules::{AttrMap, OpSource};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Attribute store over one SQLite file.
#[derive(Debug, Clone)]
pub struct AttributeStore {
    db_path: PathBuf,
}

impl AttributeStore {
    /// Open (creating if needed) the store at `db_path`.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self { db_path };
        store.connect()?.execute(
            "CREATE TABLE IF NOT EXISTS attrs (
                entity_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                source TEXT NOT NULL,
                ts INTEGER NOT NULL
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

    /// Write an attribute, replacing any previous value. No history is kept.
    pub fn set_attr(
        &self,
        entity_id: &str,
        key: &str,
        value: &str,
        source: OpSource,
        ts: i64,
    ) -> Result<(), StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM attrs WHERE entity_id = ?1 AND key = ?2",
            params![entity_id, key],
        )?;
        tx.execute(
            "INSERT INTO attrs (entity_id, key, value, source, ts) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![entity_id, key, value, source.as_str(), ts],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Every attribute, grouped by entity.
    pub fn all_attrs(&self) -> Result<AttrMap, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT entity_id, key, value FROM attrs ORDER BY rowid ASC")?;
        let mut rows = stmt.query([])?;

        let mut attrs = AttrMap::new();
        while let Some(row) = rows.next()? {
            let entity_id: String = row.get(0)?;
            let key: String = row.get(1)?;
            let value: String = row.get(2)?;
            attrs.entry(entity_id).or_default().insert(key, value);
        }
        Ok(attrs)
    }

    /// Number of stored rows.
    pub fn row_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .connect()?
            .query_row("SELECT COUNT(*) FROM attrs", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
