// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync manager: drains the queue against the remote backend.
//!
//! Per-operation state machine during a pass:
//!
//! ```text
//! PENDING --(dispatch ok)------> SYNCED
//! PENDING --(dispatch failed)--> PENDING (retryCount += 1)
//! PENDING --(retryCount >= 3)--> EXHAUSTED (parked until retry_failed)
//! ```
//!
//! Operations are dispatched one at a time in FIFO order. Remote writes to
//! the same rows must never race, so there is no parallel dispatch.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use ebb_core::{
    resolve, ClockSource, LocalStore, LocalWriter, OpKind, OperationId, OperationPatch,
    OperationRecord, Payload, Resolution, SyncMetadata, SyncQueue, Table,
};
use serde::Serialize;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

use super::backoff::backoff_delay;
use super::identity::IdentityProvider;
use super::remote::{
    Filter, RemoteBackend, RemoteError, RemoteFuture, RemoteResult, Row, LOCAL_ID_COLUMN,
    USER_ID_COLUMN,
};

/// Queue handle shared between producers and the manager.
pub type SharedQueue = Arc<Mutex<SyncQueue>>;

/// Wraps a queue for sharing.
pub fn shared(queue: SyncQueue) -> SharedQueue {
    Arc::new(Mutex::new(queue))
}

/// Configuration for the sync manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Failed attempts after which an operation leaves automatic passes.
    pub max_retries: u32,
    /// Base delay for manual retry backoff (milliseconds).
    pub backoff_base_ms: u64,
    /// Maximum delay between manual retries (milliseconds).
    pub backoff_max_ms: u64,
    /// Per remote call timeout (milliseconds). 0 disables it.
    pub request_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            max_retries: 3,
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
            request_timeout_ms: 15_000,
        }
    }
}

impl SyncConfig {
    /// Delay before re-dispatching an operation with `retry_count` failures.
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        backoff_delay(retry_count, self.backoff_base_ms, self.backoff_max_ms)
    }
}

/// Error type for sync operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Queue persistence failed.
    #[error("queue error: {0}")]
    Queue(#[from] ebb_core::Error),

    /// No signed-in user.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Remote call failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Aggregate sync status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// A pass is running.
    Syncing,
    /// Connectivity reports offline.
    Offline,
    /// The last pass recorded an error.
    Error,
    /// Unsynced operations are queued.
    Pending,
    /// Nothing left to send.
    Synced,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Syncing => "syncing",
            SyncStatus::Offline => "offline",
            SyncStatus::Error => "error",
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts from one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Operations dispatched.
    pub attempted: usize,
    /// Written to the server.
    pub synced: usize,
    /// Superseded by newer server state; marked synced without writing.
    pub discarded: usize,
    /// Failed, still below the retry ceiling.
    pub failed: usize,
    /// Failed and reached the retry ceiling during this pass.
    pub exhausted: usize,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attempted, {} synced, {} discarded, {} failed, {} exhausted",
            self.attempted, self.synced, self.discarded, self.failed, self.exhausted
        )
    }
}

/// Result of asking for a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another pass was in flight; nothing was done.
    AlreadyRunning,
}

/// Derives the aggregate status. Earlier conditions win: a running pass,
/// then lost connectivity, then a recorded error, then unsynced work.
pub fn derive_status(queue: &SyncQueue, syncing: bool, online: bool) -> SyncStatus {
    if syncing {
        SyncStatus::Syncing
    } else if !online {
        SyncStatus::Offline
    } else if queue.sync_error().is_some() {
        SyncStatus::Error
    } else if queue.unsynced_count() > 0 {
        SyncStatus::Pending
    } else {
        SyncStatus::Synced
    }
}

/// Point-in-time view of the queue for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    pub status: SyncStatus,
    pub pending: usize,
    pub exhausted: usize,
    pub last_sync_time: Option<u64>,
    pub last_error: Option<String>,
}

impl SyncSnapshot {
    pub fn capture(queue: &SyncQueue, max_retries: u32, syncing: bool, online: bool) -> Self {
        SyncSnapshot {
            status: derive_status(queue, syncing, online),
            pending: queue.unsynced_count(),
            exhausted: queue.exhausted(max_retries).len(),
            last_sync_time: queue.last_sync_time(),
            last_error: queue.sync_error().map(str::to_string),
        }
    }
}

/// What a successful dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatched {
    Applied,
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassKind {
    /// Every pending operation below the retry ceiling, no delay.
    Drain,
    /// Every operation that failed before, with backoff between attempts.
    Retry,
}

/// Clears the in-flight flag however the pass ends.
struct PassGuard<'a> {
    flag: &'a AtomicBool,
    queue: &'a SharedQueue,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = queue.set_syncing(false) {
            tracing::error!("failed to persist end of sync pass: {}", e);
        }
        self.flag.store(false, Ordering::Release);
    }
}

/// Orchestrates pushing queued operations to the remote backend.
pub struct SyncManager<R: RemoteBackend, I: IdentityProvider> {
    config: SyncConfig,
    queue: SharedQueue,
    remote: R,
    identity: I,
    clock: Arc<dyn ClockSource>,
    syncing: AtomicBool,
    online: AtomicBool,
    enqueued: Notify,
}

impl<R: RemoteBackend, I: IdentityProvider> SyncManager<R, I> {
    /// Creates a manager over a shared queue. Uses the queue's clock.
    pub fn new(config: SyncConfig, queue: SharedQueue, remote: R, identity: I) -> Self {
        let clock = queue.lock().unwrap_or_else(|e| e.into_inner()).clock().clone();
        SyncManager {
            config,
            queue,
            remote,
            identity,
            clock,
            syncing: AtomicBool::new(false),
            online: AtomicBool::new(true),
            enqueued: Notify::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the shared queue handle.
    pub fn queue(&self) -> &SharedQueue {
        &self.queue
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub(crate) fn identity(&self) -> &I {
        &self.identity
    }

    fn lock_queue(&self) -> MutexGuard<'_, SyncQueue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records connectivity as reported by the host.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Returns true while a pass is in flight.
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Resolves once something was enqueued through this manager.
    pub fn enqueued(&self) -> Notified<'_> {
        self.enqueued.notified()
    }

    /// Enqueues an operation and wakes the connectivity trigger.
    pub fn enqueue(
        &self,
        kind: OpKind,
        table: Table,
        payload: Payload,
        local_id: impl Into<String>,
    ) -> SyncResult<OperationRecord> {
        let record = self.lock_queue().enqueue(kind, table, payload, local_id)?;
        self.enqueued.notify_one();
        Ok(record)
    }

    /// Runs local mutations through a [`LocalWriter`] on the shared queue,
    /// then wakes the connectivity trigger.
    pub fn write_local<S, T>(
        &self,
        store: &mut S,
        f: impl FnOnce(&mut LocalWriter<'_, S>) -> ebb_core::Result<T>,
    ) -> SyncResult<T>
    where
        S: LocalStore,
    {
        let out = {
            let mut queue = self.lock_queue();
            let mut writer = LocalWriter::new(store, &mut queue);
            f(&mut writer)?
        };
        self.enqueued.notify_one();
        Ok(out)
    }

    /// Manual "mark as fresh": puts an exhausted operation back into
    /// automatic passes.
    pub fn mark_fresh(&self, id: &OperationId) -> SyncResult<()> {
        self.lock_queue().mark_fresh(id)?;
        Ok(())
    }

    /// Derives the aggregate status from the current flags.
    pub fn status(&self) -> SyncStatus {
        let queue = self.lock_queue();
        derive_status(&queue, self.is_syncing(), self.is_online())
    }

    /// Status plus counts, for display.
    pub fn snapshot(&self) -> SyncSnapshot {
        let queue = self.lock_queue();
        SyncSnapshot::capture(&queue, self.config.max_retries, self.is_syncing(), self.is_online())
    }

    /// Pushes every pending operation below the retry ceiling, in order.
    ///
    /// Returns [`SyncOutcome::AlreadyRunning`] without doing anything if a
    /// pass is in flight. Individual dispatch failures never abort the pass;
    /// only queue persistence failures surface as `Err`.
    pub async fn sync_all(&self) -> SyncResult<SyncOutcome> {
        self.run(PassKind::Drain).await
    }

    /// Re-dispatches every operation that failed before, including exhausted
    /// ones, waiting `min(base * 2^retryCount, max)` before each attempt.
    pub async fn retry_failed(&self) -> SyncResult<SyncOutcome> {
        self.run(PassKind::Retry).await
    }

    fn begin_pass(&self) -> Option<PassGuard<'_>> {
        self.syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassGuard {
                flag: &self.syncing,
                queue: &self.queue,
            })
    }

    async fn run(&self, kind: PassKind) -> SyncResult<SyncOutcome> {
        let Some(_pass) = self.begin_pass() else {
            tracing::debug!("sync pass already in flight, skipping");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        match self.pass(kind).await {
            Ok(report) => Ok(SyncOutcome::Completed(report)),
            Err(e) => {
                tracing::error!("sync pass aborted: {}", e);
                let mut queue = self.lock_queue();
                if let Err(persist) = queue.set_sync_error(Some(e.to_string())) {
                    tracing::error!("failed to record sync error: {}", persist);
                }
                Err(e)
            }
        }
    }

    async fn pass(&self, kind: PassKind) -> SyncResult<SyncReport> {
        let max_retries = self.config.max_retries;
        let snapshot: Vec<OperationRecord> = {
            let mut queue = self.lock_queue();
            queue.set_syncing(true)?;
            queue.set_sync_error(None)?;
            match kind {
                PassKind::Drain => {
                    queue.pending().into_iter().filter(|op| !op.is_exhausted(max_retries)).collect()
                }
                PassKind::Retry => queue.retryable(),
            }
        };
        tracing::info!(count = snapshot.len(), kind = ?kind, "starting sync pass");

        let mut report = SyncReport::default();
        for op in snapshot {
            if kind == PassKind::Retry {
                let delay = self.config.backoff_delay(op.retry_count);
                tracing::debug!(id = %op.id, delay_ms = delay.as_millis() as u64, "backing off");
                tokio::time::sleep(delay).await;
            }

            // The record may have been synced, reset or removed meanwhile.
            let current = self.lock_queue().get(&op.id).filter(|r| r.is_pending()).cloned();
            let Some(op) = current else {
                continue;
            };

            report.attempted += 1;
            tracing::debug!(id = %op.id, kind = %op.kind, table = %op.table, "dispatching");
            let outcome = self.dispatch(&op).await;
            self.settle(&op, outcome, &mut report)?;
        }

        let mut queue = self.lock_queue();
        queue.set_last_sync_time(self.clock.now_ms())?;
        if queue.sync_error().is_none() {
            let parked = queue.exhausted(max_retries).len();
            if parked > 0 {
                queue.set_sync_error(Some(format!(
                    "{parked} operation(s) exhausted {max_retries} attempts; run a manual retry"
                )))?;
            }
        }
        tracing::info!("sync pass finished: {}", report);
        Ok(report)
    }

    /// Folds a dispatch outcome back into the queue.
    fn settle(
        &self,
        op: &OperationRecord,
        outcome: SyncResult<Dispatched>,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let mut queue = self.lock_queue();
        let Some(current) = queue.get(&op.id).cloned() else {
            tracing::debug!(id = %op.id, "operation removed during dispatch");
            return Ok(());
        };

        match outcome {
            Ok(Dispatched::Applied) => {
                queue.mark_synced(&op.id)?;
                report.synced += 1;
            }
            Ok(Dispatched::Discarded) => {
                queue.mark_synced(&op.id)?;
                report.discarded += 1;
            }
            Err(SyncError::NotAuthenticated) => {
                // Transient: keep the retry budget for when the user is back.
                tracing::warn!(id = %op.id, "cannot sync while signed out");
                let patch = OperationPatch {
                    retry_count: None,
                    last_error: Some(Some(SyncError::NotAuthenticated.to_string())),
                };
                queue.update(&op.id, &patch)?;
                report.failed += 1;
            }
            Err(SyncError::Queue(e)) => return Err(SyncError::Queue(e)),
            Err(SyncError::Remote(e)) => {
                let retry_count = current.retry_count.saturating_add(1);
                queue.update(&op.id, &OperationPatch::failure(retry_count, e.to_string()))?;
                if retry_count >= self.config.max_retries {
                    tracing::warn!(
                        id = %op.id,
                        attempts = retry_count,
                        "operation exhausted retries: {}",
                        e
                    );
                    queue.set_sync_error(Some(format!(
                        "operation {} failed after {retry_count} attempts: {e}",
                        op.id
                    )))?;
                    report.exhausted += 1;
                } else {
                    tracing::warn!(id = %op.id, attempts = retry_count, "dispatch failed: {}", e);
                    report.failed += 1;
                }
            }
        }
        Ok(())
    }

    /// Runs a remote call under the configured timeout.
    pub(crate) async fn call<T>(&self, fut: RemoteFuture<'_, T>) -> RemoteResult<T> {
        let timeout_ms = self.config.request_timeout_ms;
        if timeout_ms == 0 {
            return fut.await;
        }
        match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(timeout_ms)),
        }
    }

    async fn dispatch(&self, op: &OperationRecord) -> SyncResult<Dispatched> {
        let user_id = self.identity.current_user_id().ok_or(SyncError::NotAuthenticated)?;
        let filter = Filter::owned(&user_id, &op.local_id);

        match op.kind {
            OpKind::Create => {
                // An earlier attempt may have committed the insert before failing.
                if op.retry_count > 0 {
                    let existing = self.call(self.remote.select_one(op.table, filter)).await?;
                    if existing.is_some() {
                        tracing::debug!(id = %op.id, "remote row already created");
                        self.touch_metadata(&user_id, op).await?;
                        return Ok(Dispatched::Applied);
                    }
                }
                self.push_create(&user_id, op).await?;
                Ok(Dispatched::Applied)
            }
            OpKind::Update => {
                let existing = self.call(self.remote.select_one(op.table, filter.clone())).await?;
                if existing.is_none() {
                    tracing::debug!(id = %op.id, "remote row missing, creating instead");
                    self.push_create(&user_id, op).await?;
                    return Ok(Dispatched::Applied);
                }

                let metadata = self
                    .call(self.remote.get_sync_metadata(&user_id, op.table, &op.local_id))
                    .await?;
                match resolve(op, metadata.as_ref()) {
                    Resolution::Discard => {
                        tracing::warn!(
                            id = %op.id,
                            table = %op.table,
                            local_id = %op.local_id,
                            "server holds newer state, discarding local update"
                        );
                        Ok(Dispatched::Discarded)
                    }
                    Resolution::Apply => {
                        let patch = op.payload.clone();
                        self.call(self.remote.update_by_filter(op.table, filter, patch)).await?;
                        self.touch_metadata(&user_id, op).await?;
                        Ok(Dispatched::Applied)
                    }
                }
            }
            OpKind::Delete => {
                let existing = self.call(self.remote.select_one(op.table, filter.clone())).await?;
                if existing.is_some() {
                    self.call(self.remote.delete_by_filter(op.table, filter)).await?;
                } else {
                    tracing::debug!(id = %op.id, "remote row already gone");
                }
                Ok(Dispatched::Applied)
            }
        }
    }

    async fn push_create(&self, user_id: &str, op: &OperationRecord) -> SyncResult<()> {
        let mut row = Row::new();
        row.insert(USER_ID_COLUMN.to_string(), user_id.into());
        row.extend(op.payload.clone());
        row.insert(LOCAL_ID_COLUMN.to_string(), op.local_id.clone().into());

        let remote_id = self.call(self.remote.insert(op.table, row)).await?;
        tracing::debug!(id = %op.id, remote_id = %remote_id, "inserted remote row");
        self.touch_metadata(user_id, op).await
    }

    async fn touch_metadata(&self, user_id: &str, op: &OperationRecord) -> SyncResult<()> {
        let now = self.clock.now_ms();
        let metadata = SyncMetadata {
            last_synced_at: now,
            server_updated_at: now,
        };
        self.call(self.remote.upsert_sync_metadata(user_id, op.table, &op.local_id, metadata))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
