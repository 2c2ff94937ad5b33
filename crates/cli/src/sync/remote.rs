// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote backend abstraction.
//!
//! Any record store offering filtered insert/update/delete/select plus a
//! per-record sync metadata table can back the sync manager. The trait uses
//! boxed futures so backends stay object-safe and mockable in tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::DateTime;
use ebb_core::{SyncMetadata, Table};
use serde_json::Value;

/// A remote row: column name to value.
pub type Row = serde_json::Map<String, Value>;

/// Column correlating remote rows with local records.
pub const LOCAL_ID_COLUMN: &str = "local_id";
/// Column holding the owning user.
pub const USER_ID_COLUMN: &str = "user_id";
/// Column holding the server-side modification time.
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Error type for remote backend calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The request never got a response (unreachable host, reset, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with an error.
    #[error("remote API error: {0}")]
    Api(String),

    /// The call did not finish in time.
    #[error("remote call timed out after {0}ms")]
    Timeout(u64),

    /// The backend answered with something we cannot read.
    #[error("invalid remote response: {0}")]
    InvalidResponse(String),

    #[error("invalid remote configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for remote backend calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Boxed future returned by [`RemoteBackend`] methods.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = RemoteResult<T>> + Send + 'a>>;

/// Equality filter over remote columns (all conditions must hold).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: Vec<(String, String)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `column = value` condition.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    /// Filter selecting one user's row for a local record.
    pub fn owned(user_id: &str, local_id: &str) -> Self {
        Filter::new().eq(USER_ID_COLUMN, user_id).eq(LOCAL_ID_COLUMN, local_id)
    }

    /// Filter selecting every row owned by a user.
    pub fn user(user_id: &str) -> Self {
        Filter::new().eq(USER_ID_COLUMN, user_id)
    }

    pub fn conditions(&self) -> &[(String, String)] {
        &self.conditions
    }

    /// Returns true if `row` satisfies every condition.
    ///
    /// Non-string values compare by their JSON text, so `42` matches `"42"`.
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|(column, expected)| match row.get(column) {
            Some(Value::String(s)) => s == expected,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == *expected,
        })
    }
}

/// Reads a timestamp column as ms since epoch.
///
/// Accepts integer milliseconds or RFC 3339 strings.
pub fn row_timestamp_ms(row: &Row, column: &str) -> Option<u64> {
    match row.get(column)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .and_then(|dt| u64::try_from(dt.timestamp_millis()).ok()),
        _ => None,
    }
}

/// Record-oriented remote store.
pub trait RemoteBackend: Send + Sync {
    /// Inserts a row and returns its server identifier.
    fn insert(&self, table: Table, row: Row) -> RemoteFuture<'_, String>;

    /// Patches every row matching `filter`.
    fn update_by_filter(&self, table: Table, filter: Filter, patch: Row) -> RemoteFuture<'_, ()>;

    /// Deletes every row matching `filter`.
    fn delete_by_filter(&self, table: Table, filter: Filter) -> RemoteFuture<'_, ()>;

    /// Returns the first row matching `filter`, if any.
    fn select_one(&self, table: Table, filter: Filter) -> RemoteFuture<'_, Option<Row>>;

    /// Returns every row matching `filter`.
    fn select_all(&self, table: Table, filter: Filter) -> RemoteFuture<'_, Vec<Row>>;

    /// Records the sync bookkeeping for one `(user, table, local_id)`.
    fn upsert_sync_metadata(
        &self,
        user_id: &str,
        table: Table,
        local_id: &str,
        metadata: SyncMetadata,
    ) -> RemoteFuture<'_, ()>;

    /// Reads the sync bookkeeping for one `(user, table, local_id)`.
    fn get_sync_metadata(
        &self,
        user_id: &str,
        table: Table,
        local_id: &str,
    ) -> RemoteFuture<'_, Option<SyncMetadata>>;
}

impl<R: RemoteBackend + ?Sized> RemoteBackend for Arc<R> {
    fn insert(&self, table: Table, row: Row) -> RemoteFuture<'_, String> {
        (**self).insert(table, row)
    }

    fn update_by_filter(&self, table: Table, filter: Filter, patch: Row) -> RemoteFuture<'_, ()> {
        (**self).update_by_filter(table, filter, patch)
    }

    fn delete_by_filter(&self, table: Table, filter: Filter) -> RemoteFuture<'_, ()> {
        (**self).delete_by_filter(table, filter)
    }

    fn select_one(&self, table: Table, filter: Filter) -> RemoteFuture<'_, Option<Row>> {
        (**self).select_one(table, filter)
    }

    fn select_all(&self, table: Table, filter: Filter) -> RemoteFuture<'_, Vec<Row>> {
        (**self).select_all(table, filter)
    }

    fn upsert_sync_metadata(
        &self,
        user_id: &str,
        table: Table,
        local_id: &str,
        metadata: SyncMetadata,
    ) -> RemoteFuture<'_, ()> {
        (**self).upsert_sync_metadata(user_id, table, local_id, metadata)
    }

    fn get_sync_metadata(
        &self,
        user_id: &str,
        table: Table,
        local_id: &str,
    ) -> RemoteFuture<'_, Option<SyncMetadata>> {
        (**self).get_sync_metadata(user_id, table, local_id)
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
