//! Database module - SQLite storage for knowledge base snapshots
//!
//! Each import is kept as a whole JSON snapshot. Indices are never stored,
//! they are rebuilt when a snapshot is loaded.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::model::KnowledgeBase;

/// Summary row for a stored snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub id: i64,
    pub saved_at: DateTime<Utc>,
    pub weeks: usize,
    pub trainings: usize,
    pub exercises: usize,
    pub date_range: String,
}

/// Database wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                saved_at TEXT NOT NULL,
                weeks INTEGER NOT NULL,
                trainings INTEGER NOT NULL,
                exercises INTEGER NOT NULL,
                date_range TEXT NOT NULL,
                data TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Store the whole knowledge base, returns the snapshot id
    pub fn save_snapshot(&self, kb: &KnowledgeBase) -> Result<i64> {
        let meta = kb.metadata();
        self.conn.execute(
            "INSERT INTO snapshots (saved_at, weeks, trainings, exercises, date_range, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Utc::now().to_rfc3339(),
                meta.total_weeks as i64,
                meta.total_trainings as i64,
                meta.total_exercises as i64,
                meta.date_range,
                kb.to_json()?,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(id, weeks = meta.total_weeks, "snapshot saved");
        Ok(id)
    }

    pub fn load_snapshot(&self, id: i64) -> Result<Option<KnowledgeBase>> {
        let data: Option<String> = self
            .conn
            .query_row("SELECT data FROM snapshots WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        data.map(|json| KnowledgeBase::from_json(&json)).transpose()
    }

    /// Most recently saved snapshot, if any
    pub fn latest_snapshot(&self) -> Result<Option<KnowledgeBase>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM snapshots ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|json| KnowledgeBase::from_json(&json)).transpose()
    }

    /// Newest first
    pub fn list_snapshots(&self, limit: usize) -> Result<Vec<SnapshotInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, saved_at, weeks, trainings, exercises, date_range
             FROM snapshots ORDER BY id DESC LIMIT ?1",
        )?;

        let snapshots = stmt
            .query_map(params![limit as i64], |row| {
                let saved_at: String = row.get(1)?;
                Ok(SnapshotInfo {
                    id: row.get(0)?,
                    saved_at: DateTime::parse_from_rfc3339(&saved_at)
                        .map(|d| d.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    weeks: row.get::<_, i64>(2)? as usize,
                    trainings: row.get::<_, i64>(3)? as usize,
                    exercises: row.get::<_, i64>(4)? as usize,
                    date_range: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(snapshots)
    }

    /// Drop every stored snapshot
    pub fn clear(&self) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM snapshots", [])?;
        info!(removed, "snapshots cleared");
        Ok(removed)
    }
}
