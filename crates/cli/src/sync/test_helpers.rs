// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for sync module tests.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use std::sync::atomic::{AtomicBool, Ordering};

use ebb_core::{
    ManualClock, MemoryStore, OpKind, OperationRecord, Payload, QueueState, QueueStore,
    SyncMetadata, SyncQueue, Table,
};
use serde_json::json;
use tokio::time::Instant;

use super::identity::StaticIdentity;
use super::manager::{shared, SyncConfig, SyncManager};
use super::remote::{Filter, RemoteBackend, RemoteError, RemoteFuture, RemoteResult, Row};

pub const USER: &str = "user-1";

/// One observed backend call.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: &'static str,
    pub table: Table,
    pub at: Instant,
}

#[derive(Default)]
struct Inner {
    rows: HashMap<Table, Vec<Row>>,
    metadata: HashMap<(String, Table, String), SyncMetadata>,
    calls: Vec<Call>,
    fail_writes: u32,
    fail_metadata_writes: u32,
    unreachable: bool,
    failing_select_all: HashSet<Table>,
    latency: Option<Duration>,
    next_id: u64,
}

/// In-memory backend. Clones share state so tests can inspect it after
/// handing one to a manager.
#[derive(Clone, Default)]
pub struct MockRemote {
    inner: Arc<Mutex<Inner>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Fails the next `n` insert/update/delete calls with a network error.
    pub fn fail_writes(&self, n: u32) {
        self.lock().fail_writes = n;
    }

    /// Fails the next `n` sync metadata upserts with a network error.
    pub fn fail_metadata_writes(&self, n: u32) {
        self.lock().fail_metadata_writes = n;
    }

    /// Fails every call while set.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    pub fn fail_select_all(&self, table: Table) {
        self.lock().failing_select_all.insert(table);
    }

    /// Delays every call by `latency` (virtual time under a paused clock).
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    pub fn seed_row(&self, table: Table, row: Row) {
        self.lock().rows.entry(table).or_default().push(row);
    }

    pub fn seed_metadata(&self, table: Table, local_id: &str, metadata: SyncMetadata) {
        self.lock().metadata.insert((USER.to_string(), table, local_id.to_string()), metadata);
    }

    pub fn rows(&self, table: Table) -> Vec<Row> {
        self.lock().rows.get(&table).cloned().unwrap_or_default()
    }

    pub fn metadata(&self, table: Table, local_id: &str) -> Option<SyncMetadata> {
        self.lock().metadata.get(&(USER.to_string(), table, local_id.to_string())).copied()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Method names of every call so far, in order.
    pub fn methods(&self) -> Vec<&'static str> {
        self.lock().calls.iter().map(|c| c.method).collect()
    }

    /// Calls that write to a record table.
    pub fn writes(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c.method, "insert" | "update" | "delete"))
            .cloned()
            .collect()
    }

    fn respond<T, F>(&self, method: &'static str, table: Table, f: F) -> RemoteFuture<'_, T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Inner) -> RemoteResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let latency = {
                let mut guard = inner.lock().unwrap();
                guard.calls.push(Call {
                    method,
                    table,
                    at: Instant::now(),
                });
                guard.latency
            };
            match latency {
                Some(delay) => tokio::time::sleep(delay).await,
                None => tokio::task::yield_now().await,
            }

            let mut guard = inner.lock().unwrap();
            if guard.unreachable {
                return Err(RemoteError::Network("connection refused".to_string()));
            }
            let is_write = matches!(method, "insert" | "update" | "delete");
            if is_write && guard.fail_writes > 0 {
                guard.fail_writes -= 1;
                return Err(RemoteError::Network("connection reset".to_string()));
            }
            if method == "upsert_metadata" && guard.fail_metadata_writes > 0 {
                guard.fail_metadata_writes -= 1;
                return Err(RemoteError::Network("connection reset".to_string()));
            }
            f(&mut *guard)
        })
    }
}

impl RemoteBackend for MockRemote {
    fn insert(&self, table: Table, mut row: Row) -> RemoteFuture<'_, String> {
        self.respond("insert", table, move |inner| {
            inner.next_id += 1;
            let id = format!("remote-{}", inner.next_id);
            row.insert("id".to_string(), id.clone().into());
            inner.rows.entry(table).or_default().push(row);
            Ok(id)
        })
    }

    fn update_by_filter(&self, table: Table, filter: Filter, patch: Row) -> RemoteFuture<'_, ()> {
        self.respond("update", table, move |inner| {
            for row in inner.rows.entry(table).or_default().iter_mut() {
                if filter.matches(row) {
                    row.extend(patch.clone());
                }
            }
            Ok(())
        })
    }

    fn delete_by_filter(&self, table: Table, filter: Filter) -> RemoteFuture<'_, ()> {
        self.respond("delete", table, move |inner| {
            inner.rows.entry(table).or_default().retain(|row| !filter.matches(row));
            Ok(())
        })
    }

    fn select_one(&self, table: Table, filter: Filter) -> RemoteFuture<'_, Option<Row>> {
        self.respond("select_one", table, move |inner| {
            let rows = inner.rows.get(&table);
            Ok(rows.and_then(|rows| rows.iter().find(|r| filter.matches(r))).cloned())
        })
    }

    fn select_all(&self, table: Table, filter: Filter) -> RemoteFuture<'_, Vec<Row>> {
        self.respond("select_all", table, move |inner| {
            if inner.failing_select_all.contains(&table) {
                return Err(RemoteError::Api("permission denied".to_string()));
            }
            Ok(inner
                .rows
                .get(&table)
                .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
                .unwrap_or_default())
        })
    }

    fn upsert_sync_metadata(
        &self,
        user_id: &str,
        table: Table,
        local_id: &str,
        metadata: SyncMetadata,
    ) -> RemoteFuture<'_, ()> {
        let key = (user_id.to_string(), table, local_id.to_string());
        self.respond("upsert_metadata", table, move |inner| {
            inner.metadata.insert(key, metadata);
            Ok(())
        })
    }

    fn get_sync_metadata(
        &self,
        user_id: &str,
        table: Table,
        local_id: &str,
    ) -> RemoteFuture<'_, Option<SyncMetadata>> {
        let key = (user_id.to_string(), table, local_id.to_string());
        self.respond("get_metadata", table, move |inner| Ok(inner.metadata.get(&key).copied()))
    }
}

/// Manager wired to a mock remote, an in-memory queue and a manual clock.
pub struct Harness {
    pub manager: SyncManager<MockRemote, StaticIdentity>,
    pub remote: MockRemote,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_identity(StaticIdentity::signed_in(USER))
    }

    pub fn with_identity(identity: StaticIdentity) -> Self {
        Self::with_config(SyncConfig::default(), identity)
    }

    pub fn with_config(config: SyncConfig, identity: StaticIdentity) -> Self {
        let clock = Arc::new(ManualClock::new(1_000));
        let queue = SyncQueue::in_memory(clock.clone());
        Self::over_queue(queue, clock, config, identity)
    }

    /// Harness whose queue persists through `store`.
    pub fn with_store(store: impl QueueStore + 'static) -> Self {
        let clock = Arc::new(ManualClock::new(1_000));
        let queue = SyncQueue::open(store, clock.clone()).unwrap();
        Self::over_queue(queue, clock, SyncConfig::default(), StaticIdentity::signed_in(USER))
    }

    fn over_queue(
        queue: SyncQueue,
        clock: Arc<ManualClock>,
        config: SyncConfig,
        identity: StaticIdentity,
    ) -> Self {
        let remote = MockRemote::new();
        let manager = SyncManager::new(config, shared(queue), remote.clone(), identity);
        Harness {
            manager,
            remote,
            clock,
        }
    }

    /// Enqueues an operation, advancing the clock so records get distinct
    /// timestamps.
    pub fn enqueue(
        &self,
        kind: OpKind,
        table: Table,
        payload: Payload,
        local_id: &str,
    ) -> OperationRecord {
        self.clock.advance(10);
        self.manager.enqueue(kind, table, payload, local_id).unwrap()
    }
}

/// Queue store that rejects every save while `failing` is set.
#[derive(Clone, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    failing: Arc<AtomicBool>,
}

impl FailingStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl QueueStore for FailingStore {
    fn load(&self) -> ebb_core::Result<Option<QueueState>> {
        self.inner.load()
    }

    fn save(&mut self, state: &QueueState) -> ebb_core::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ebb_core::Error::Io(std::io::Error::other("disk full")));
        }
        self.inner.save(state)
    }
}

/// Builds a payload from a JSON object literal.
pub fn payload(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// A remote row owned by [`USER`].
pub fn remote_row(local_id: &str, updated_at: u64, title: &str) -> Row {
    payload(json!({
        "id": format!("srv-{local_id}"),
        "user_id": USER,
        "local_id": local_id,
        "title": title,
        "updated_at": updated_at,
    }))
}
