// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote-to-local reconciliation.
//!
//! Best-effort: failures are logged and never touch the push queue.

use ebb_core::{remote_wins, LocalRecord, LocalStore, Table};

use super::identity::IdentityProvider;
use super::manager::SyncManager;
use super::remote::{
    row_timestamp_ms, Filter, RemoteBackend, Row, LOCAL_ID_COLUMN, UPDATED_AT_COLUMN,
    USER_ID_COLUMN,
};

/// Server-owned columns that never enter a local record body.
const SERVER_COLUMNS: [&str; 3] = ["id", USER_ID_COLUMN, LOCAL_ID_COLUMN];

/// Counts from one pull.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Remote rows written into the local store.
    pub applied: usize,
    /// Rows left alone: local copy as new or newer, or the row was unreadable.
    pub skipped: usize,
    /// Tables whose fetch or merge failed.
    pub failed_tables: Vec<Table>,
}

impl<R: RemoteBackend, I: IdentityProvider> SyncManager<R, I> {
    /// Downloads every remote row owned by the current user and merges it
    /// into `store`, keeping whichever side was modified last.
    pub async fn pull_remote_changes<S: LocalStore>(&self, store: &mut S) -> PullReport {
        let mut report = PullReport::default();
        let Some(user_id) = self.identity().current_user_id() else {
            tracing::warn!("skipping pull: not authenticated");
            return report;
        };

        for table in Table::ALL {
            let fetch = self.remote().select_all(table, Filter::user(&user_id));
            let rows = match self.call(fetch).await {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::error!(table = %table, "pull failed: {}", e);
                    report.failed_tables.push(table);
                    continue;
                }
            };

            tracing::debug!(table = %table, rows = rows.len(), "merging remote rows");
            for row in rows {
                match merge_row(store, table, row) {
                    Ok(true) => report.applied += 1,
                    Ok(false) => report.skipped += 1,
                    Err(e) => {
                        tracing::error!(table = %table, "failed to merge remote row: {}", e);
                        if !report.failed_tables.contains(&table) {
                            report.failed_tables.push(table);
                        }
                    }
                }
            }
        }

        tracing::info!(
            applied = report.applied,
            skipped = report.skipped,
            failed = report.failed_tables.len(),
            "pull finished"
        );
        report
    }
}

/// Writes `row` locally if the remote copy is newer. Returns whether it did.
fn merge_row<S: LocalStore>(store: &mut S, table: Table, mut row: Row) -> ebb_core::Result<bool> {
    let local_id = row.get(LOCAL_ID_COLUMN).and_then(|v| v.as_str()).map(str::to_string);
    let Some(local_id) = local_id else {
        tracing::debug!(table = %table, "remote row has no local id");
        return Ok(false);
    };
    let Some(remote_updated_at) = row_timestamp_ms(&row, UPDATED_AT_COLUMN) else {
        tracing::debug!(
            table = %table,
            local_id = %local_id,
            "remote row has no usable updated_at"
        );
        return Ok(false);
    };

    let local_updated_at = store.get(table, &local_id)?.map(|r| r.updated_at);
    if !remote_wins(local_updated_at, remote_updated_at) {
        return Ok(false);
    }

    for column in SERVER_COLUMNS {
        row.remove(column);
    }
    let record = LocalRecord {
        local_id,
        body: row,
        updated_at: remote_updated_at,
    };
    store.upsert(table, &record)?;
    Ok(true)
}

#[cfg(test)]
#[path = "pull_tests.rs"]
mod tests;
