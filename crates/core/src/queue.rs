// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The sync queue: ordered, durable storage of pending mutations.
//!
//! The queue is the single source of truth for what must eventually reach
//! the server. Records keep insertion order (FIFO) and every mutation is
//! written through to the [`QueueStore`] before it becomes visible, so the
//! in-memory view never runs ahead of what survives a restart. The pass
//! bookkeeping (`isSyncing`, `lastSyncTime`, `syncError`) is the exception:
//! it changes in memory first and is then persisted.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::{ClockSource, SystemClock};
use crate::error::{Error, Result};
use crate::op::{OpKind, OperationId, OperationPatch, OperationRecord, Payload, Table};
use crate::store::{FileStore, MemoryStore, QueueStore};

/// The persisted queue blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueState {
    #[serde(default)]
    pub queue: Vec<OperationRecord>,
    /// Re-entrancy flag for drain passes.
    #[serde(default)]
    pub is_syncing: bool,
    #[serde(default)]
    pub last_sync_time: Option<u64>,
    #[serde(default)]
    pub sync_error: Option<String>,
}

/// Ordered, persisted collection of operation records.
pub struct SyncQueue {
    state: QueueState,
    store: Box<dyn QueueStore>,
    clock: Arc<dyn ClockSource>,
}

impl SyncQueue {
    /// Opens a queue over `store`, loading any previously saved state.
    ///
    /// A persisted `isSyncing` flag is cleared: no drain pass survives a
    /// restart.
    pub fn open(store: impl QueueStore + 'static, clock: Arc<dyn ClockSource>) -> Result<Self> {
        let mut state = store.load()?.unwrap_or_default();
        if state.is_syncing {
            tracing::debug!("clearing stale isSyncing flag from previous process");
            state.is_syncing = false;
        }
        Ok(SyncQueue {
            state,
            store: Box::new(store),
            clock,
        })
    }

    /// Opens a file-backed queue using the system clock.
    pub fn open_file(path: &Path) -> Result<Self> {
        Self::open(FileStore::new(path), Arc::new(SystemClock))
    }

    /// Creates an empty queue backed by a fresh [`MemoryStore`].
    pub fn in_memory(clock: Arc<dyn ClockSource>) -> Self {
        SyncQueue {
            state: QueueState::default(),
            store: Box::new(MemoryStore::new()),
            clock,
        }
    }

    /// Applies `f` to a copy of the state, persists it, then commits.
    fn modify<T>(&mut self, f: impl FnOnce(&mut QueueState) -> Result<T>) -> Result<T> {
        let mut next = self.state.clone();
        let out = f(&mut next)?;
        self.store.save(&next)?;
        self.state = next;
        Ok(out)
    }

    /// Applies `f` to the live state, then persists it. The change is kept
    /// in memory even when the save fails.
    fn modify_bookkeeping(&mut self, f: impl FnOnce(&mut QueueState)) -> Result<()> {
        f(&mut self.state);
        self.store.save(&self.state)
    }

    /// Appends a new record and persists it immediately.
    pub fn enqueue(
        &mut self,
        kind: OpKind,
        table: Table,
        payload: Payload,
        local_id: impl Into<String>,
    ) -> Result<OperationRecord> {
        let now = self.clock.now_ms();
        let record = OperationRecord::new(kind, table, payload, local_id.into(), now);
        self.modify(|state| {
            state.queue.push(record.clone());
            Ok(())
        })?;
        tracing::debug!(id = %record.id, kind = %kind, table = %table, "enqueued operation");
        Ok(record)
    }

    /// Deletes a record outright. Returns false if it was not queued.
    pub fn remove(&mut self, id: &OperationId) -> Result<bool> {
        if self.get(id).is_none() {
            return Ok(false);
        }
        self.modify(|state| {
            state.queue.retain(|r| &r.id != id);
            Ok(true)
        })
    }

    /// Merges `patch` into a record.
    ///
    /// The retry count only moves forward here; use [`SyncQueue::mark_fresh`]
    /// to reset it.
    pub fn update(&mut self, id: &OperationId, patch: &OperationPatch) -> Result<()> {
        self.modify(|state| {
            let record = find_mut(state, id)?;
            if let Some(retry_count) = patch.retry_count {
                if retry_count < record.retry_count {
                    return Err(Error::InvalidInput(format!(
                        "retry count for {id} cannot decrease from {} to {retry_count}",
                        record.retry_count
                    )));
                }
            }
            record.apply(patch);
            Ok(())
        })
    }

    /// Flags a record as synced. It stays queued until purged.
    pub fn mark_synced(&mut self, id: &OperationId) -> Result<()> {
        self.modify(|state| {
            let record = find_mut(state, id)?;
            record.synced = true;
            record.last_error = None;
            Ok(())
        })
    }

    /// Manual "mark as fresh": resets the retry count and clears the error,
    /// putting an exhausted record back into automatic passes.
    pub fn mark_fresh(&mut self, id: &OperationId) -> Result<()> {
        self.modify(|state| {
            find_mut(state, id)?.apply(&OperationPatch::fresh());
            Ok(())
        })
    }

    /// Returns a record by id.
    pub fn get(&self, id: &OperationId) -> Option<&OperationRecord> {
        self.state.queue.iter().find(|r| &r.id == id)
    }

    /// All unsynced records in insertion order.
    ///
    /// Returns an owned snapshot: records enqueued afterwards are not part of it.
    pub fn pending(&self) -> Vec<OperationRecord> {
        self.state.queue.iter().filter(|r| r.is_pending()).cloned().collect()
    }

    /// Unsynced records that have failed at least once.
    pub fn retryable(&self) -> Vec<OperationRecord> {
        self.state
            .queue
            .iter()
            .filter(|r| r.is_pending() && r.retry_count > 0)
            .cloned()
            .collect()
    }

    /// Unsynced records parked at the retry ceiling.
    pub fn exhausted(&self, max_retries: u32) -> Vec<OperationRecord> {
        self.state.queue.iter().filter(|r| r.is_exhausted(max_retries)).cloned().collect()
    }

    /// All records, synced or not, in insertion order.
    pub fn records(&self) -> &[OperationRecord] {
        &self.state.queue
    }

    /// Removes every synced record. Returns how many were dropped.
    pub fn purge_synced(&mut self) -> Result<usize> {
        let synced = self.state.queue.iter().filter(|r| r.synced).count();
        if synced == 0 {
            return Ok(0);
        }
        self.modify(|state| {
            state.queue.retain(|r| !r.synced);
            Ok(synced)
        })
    }

    /// Wipes the whole queue, including sync bookkeeping.
    pub fn clear(&mut self) -> Result<()> {
        self.modify(|state| {
            *state = QueueState::default();
            Ok(())
        })
    }

    pub fn len(&self) -> usize {
        self.state.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.queue.is_empty()
    }

    /// Number of records that still have to reach the server.
    pub fn unsynced_count(&self) -> usize {
        self.state.queue.iter().filter(|r| r.is_pending()).count()
    }

    pub fn is_syncing(&self) -> bool {
        self.state.is_syncing
    }

    pub fn set_syncing(&mut self, syncing: bool) -> Result<()> {
        self.modify_bookkeeping(|state| state.is_syncing = syncing)
    }

    pub fn last_sync_time(&self) -> Option<u64> {
        self.state.last_sync_time
    }

    pub fn set_last_sync_time(&mut self, time_ms: u64) -> Result<()> {
        self.modify_bookkeeping(|state| state.last_sync_time = Some(time_ms))
    }

    pub fn sync_error(&self) -> Option<&str> {
        self.state.sync_error.as_deref()
    }

    pub fn set_sync_error(&mut self, error: Option<String>) -> Result<()> {
        self.modify_bookkeeping(|state| state.sync_error = error)
    }

    /// Returns the full in-memory state.
    pub fn state(&self) -> &QueueState {
        &self.state
    }

    /// Returns the clock used to stamp new records.
    pub fn clock(&self) -> &Arc<dyn ClockSource> {
        &self.clock
    }
}

fn find_mut<'a>(state: &'a mut QueueState, id: &OperationId) -> Result<&'a mut OperationRecord> {
    state
        .queue
        .iter_mut()
        .find(|r| &r.id == id)
        .ok_or_else(|| Error::OperationNotFound(id.to_string()))
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
