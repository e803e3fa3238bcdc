use crate::error::Result;
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

/// Persisted form of a game session.
///
/// `snapshot` is an opaque JSON blob owned by the protocol layer; the
/// remaining columns exist so sessions can be listed without decoding it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: u64,
    pub game_type: String,
    pub state: String,
    pub winner: Option<String>,
    pub open: bool,
    pub snapshot: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct SessionStore<'a> {
    storage: &'a Storage,
}

impl<'a> SessionStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn save_session(&self, record: &SessionRecord) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT OR REPLACE INTO sessions
             (id, game_type, state, winner, open, snapshot, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id as i64,
                record.game_type,
                record.state,
                record.winner,
                record.open as i64,
                record.snapshot,
                record.created_at.timestamp(),
                record.updated_at.timestamp(),
            ],
        )?;

        Ok(())
    }

    pub async fn load_session(&self, id: u64) -> Result<Option<SessionRecord>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT id, game_type, state, winner, open, snapshot, created_at, updated_at
             FROM sessions WHERE id = ?1",
        )?;

        let record = stmt
            .query_row(params![id as i64], Self::row_to_record)
            .optional()?;

        Ok(record)
    }

    /// Sessions that were not terminal when last saved.
    pub async fn load_open_sessions(&self) -> Result<Vec<SessionRecord>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT id, game_type, state, winner, open, snapshot, created_at, updated_at
             FROM sessions WHERE open = 1 ORDER BY id ASC",
        )?;

        let record_iter = stmt.query_map([], Self::row_to_record)?;

        let mut records = Vec::new();
        for record in record_iter {
            records.push(record?);
        }

        Ok(records)
    }

    /// Highest identifier ever allocated; identifiers are never reused.
    pub async fn max_session_id(&self) -> Result<u64> {
        let conn = self.storage.get_connection().await;

        let max: i64 = conn.query_row("SELECT COALESCE(MAX(id), 0) FROM sessions", [], |row| {
            row.get(0)
        })?;

        Ok(max as u64)
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
        Ok(SessionRecord {
            id: row.get::<_, i64>(0)? as u64,
            game_type: row.get(1)?,
            state: row.get(2)?,
            winner: row.get(3)?,
            open: row.get::<_, i64>(4)? != 0,
            snapshot: row.get(5)?,
            created_at: chrono::DateTime::from_timestamp(row.get(6)?, 0).unwrap_or_else(Utc::now),
            updated_at: chrono::DateTime::from_timestamp(row.get(7)?, 0).unwrap_or_else(Utc::now),
        })
    }
}
