// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local entity stores.
//!
//! The sync layer reads from and writes into per-table collections of local
//! records. [`SqliteLocalStore`] keeps every table in one SQLite file with
//! record bodies stored as JSON.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::{Error, Result};
use crate::op::{Payload, Table};

/// SQL schema for the local record store.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    table_name TEXT NOT NULL,
    local_id TEXT NOT NULL,
    body TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (table_name, local_id)
);

CREATE INDEX IF NOT EXISTS idx_records_updated ON records(table_name, updated_at);
"#;

/// One record as the local store sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalRecord {
    /// Locally-unique identifier, assigned by the producer.
    pub local_id: String,
    pub body: Payload,
    /// Last local modification, ms since epoch.
    pub updated_at: u64,
}

/// A per-table local collection the sync layer can read and merge into.
pub trait LocalStore: Send {
    /// Returns every record in `table`.
    fn enumerate_all(&self, table: Table) -> Result<Vec<LocalRecord>>;

    /// Returns a record by its local id.
    fn get(&self, table: Table, local_id: &str) -> Result<Option<LocalRecord>>;

    /// Inserts or replaces a record.
    fn upsert(&mut self, table: Table, record: &LocalRecord) -> Result<()>;

    /// Deletes a record. Returns false if it did not exist.
    fn remove(&mut self, table: Table, local_id: &str) -> Result<bool>;
}

/// SQLite-backed local store.
pub struct SqliteLocalStore {
    conn: Connection,
}

impl SqliteLocalStore {
    /// Opens (or creates) a store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteLocalStore { conn })
    }

    /// Opens a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteLocalStore { conn })
    }
}

fn to_sql_time(ms: u64) -> Result<i64> {
    i64::try_from(ms).map_err(|_| Error::InvalidInput(format!("timestamp out of range: {ms}")))
}

fn row_to_record(local_id: String, body: String, updated_at: i64) -> Result<LocalRecord> {
    let body: Payload = serde_json::from_str(&body)
        .map_err(|e| Error::CorruptedData(format!("invalid body for '{local_id}': {e}")))?;
    let updated_at = u64::try_from(updated_at)
        .map_err(|_| Error::CorruptedData(format!("negative updated_at for '{local_id}'")))?;
    Ok(LocalRecord {
        local_id,
        body,
        updated_at,
    })
}

impl LocalStore for SqliteLocalStore {
    fn enumerate_all(&self, table: Table) -> Result<Vec<LocalRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT local_id, body, updated_at FROM records
             WHERE table_name = ?1 ORDER BY updated_at, local_id",
        )?;
        let rows = stmt
            .query_map(params![table.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(local_id, body, updated_at)| row_to_record(local_id, body, updated_at))
            .collect()
    }

    fn get(&self, table: Table, local_id: &str) -> Result<Option<LocalRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT local_id, body, updated_at FROM records
                 WHERE table_name = ?1 AND local_id = ?2",
                params![table.as_str(), local_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(local_id, body, updated_at)| row_to_record(local_id, body, updated_at))
            .transpose()
    }

    fn upsert(&mut self, table: Table, record: &LocalRecord) -> Result<()> {
        let body = serde_json::to_string(&record.body)?;
        self.conn.execute(
            "INSERT INTO records (table_name, local_id, body, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(table_name, local_id)
             DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![table.as_str(), record.local_id, body, to_sql_time(record.updated_at)?],
        )?;
        Ok(())
    }

    fn remove(&mut self, table: Table, local_id: &str) -> Result<bool> {
        let affected = self.conn.execute(
            "DELETE FROM records WHERE table_name = ?1 AND local_id = ?2",
            params![table.as_str(), local_id],
        )?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
