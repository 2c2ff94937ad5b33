// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::panic)]

use super::*;
use crate::sync::identity::StaticIdentity;
use crate::sync::test_helpers::{payload, remote_row, FailingStore, Harness, USER};
use serde_json::json;
use tokio::time::Instant;

fn completed(outcome: SyncOutcome) -> SyncReport {
    match outcome {
        SyncOutcome::Completed(report) => report,
        SyncOutcome::AlreadyRunning => panic!("expected a completed pass"),
    }
}

fn record(h: &Harness, id: &OperationId) -> OperationRecord {
    h.manager.queue().lock().unwrap().get(id).cloned().unwrap()
}

/// Runs `n` passes, each failing its first write.
async fn fail_times(h: &Harness, n: u32) {
    h.remote.fail_writes(n);
    for _ in 0..n {
        completed(h.manager.sync_all().await.unwrap());
    }
}

#[tokio::test]
async fn drains_in_fifo_order() {
    let h = Harness::new();
    for local_id in ["a", "b", "c"] {
        h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": local_id})), local_id);
    }

    let report = completed(h.manager.sync_all().await.unwrap());
    assert_eq!(report.attempted, 3);
    assert_eq!(report.synced, 3);

    let order: Vec<String> = h
        .remote
        .rows(Table::Tasks)
        .iter()
        .map(|row| row["local_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(order, vec!["a", "b", "c"]);
    assert_eq!(
        h.remote.methods(),
        vec!["insert", "upsert_metadata", "insert", "upsert_metadata", "insert", "upsert_metadata"]
    );
}

#[tokio::test]
async fn second_concurrent_pass_is_a_no_op() {
    let h = Harness::new();
    h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "x"})), "t-1");

    let (first, second) = tokio::join!(h.manager.sync_all(), h.manager.sync_all());

    assert_eq!(completed(first.unwrap()).synced, 1);
    assert_eq!(second.unwrap(), SyncOutcome::AlreadyRunning);
    assert_eq!(h.remote.methods(), vec!["insert", "upsert_metadata"]);
    assert!(!h.manager.is_syncing());
    assert!(!h.manager.queue().lock().unwrap().is_syncing());
}

#[tokio::test]
async fn update_older_than_server_state_is_discarded() {
    let h = Harness::new();
    h.remote.seed_row(Table::Tasks, remote_row("t-1", 500, "server"));
    let op = h.enqueue(OpKind::Update, Table::Tasks, payload(json!({"title": "local"})), "t-1");
    h.remote.seed_metadata(
        Table::Tasks,
        "t-1",
        SyncMetadata {
            last_synced_at: op.created_at + 5,
            server_updated_at: op.created_at + 5,
        },
    );

    let report = completed(h.manager.sync_all().await.unwrap());

    assert_eq!(report.discarded, 1);
    assert!(record(&h, &op.id).synced);
    assert!(h.remote.writes().is_empty());
    assert_eq!(h.remote.rows(Table::Tasks)[0]["title"], "server");
}

#[tokio::test]
async fn update_newer_than_server_state_is_applied() {
    let h = Harness::new();
    h.remote.seed_row(Table::Tasks, remote_row("t-1", 500, "server"));
    h.remote.seed_metadata(
        Table::Tasks,
        "t-1",
        SyncMetadata {
            last_synced_at: 500,
            server_updated_at: 500,
        },
    );
    let op = h.enqueue(OpKind::Update, Table::Tasks, payload(json!({"title": "local"})), "t-1");

    let report = completed(h.manager.sync_all().await.unwrap());

    assert_eq!(report.synced, 1);
    assert!(record(&h, &op.id).synced);
    assert_eq!(h.remote.methods(), vec!["select_one", "get_metadata", "update", "upsert_metadata"]);
    assert_eq!(h.remote.rows(Table::Tasks)[0]["title"], "local");
    let metadata = h.remote.metadata(Table::Tasks, "t-1").unwrap();
    assert!(metadata.server_updated_at >= op.created_at);
    assert!(metadata.last_synced_at >= op.created_at);
}

#[tokio::test]
async fn update_without_metadata_is_applied() {
    let h = Harness::new();
    h.remote.seed_row(Table::Tasks, remote_row("t-1", 500, "server"));
    h.enqueue(OpKind::Update, Table::Tasks, payload(json!({"title": "local"})), "t-1");

    let report = completed(h.manager.sync_all().await.unwrap());

    assert_eq!(report.synced, 1);
    assert_eq!(h.remote.rows(Table::Tasks)[0]["title"], "local");
    assert!(h.remote.metadata(Table::Tasks, "t-1").is_some());
}

#[tokio::test(start_paused = true)]
async fn exhausted_operation_waits_for_manual_retry() {
    let h = Harness::new();
    let op = h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "x"})), "t-1");

    fail_times(&h, 3).await;

    let parked = record(&h, &op.id);
    assert_eq!(parked.retry_count, 3);
    assert!(!parked.synced);
    assert!(parked.last_error.is_some());
    assert_eq!(h.manager.status(), SyncStatus::Error);

    let calls_before = h.remote.calls().len();
    let report = completed(h.manager.sync_all().await.unwrap());
    assert_eq!(report.attempted, 0);
    assert_eq!(h.remote.calls().len(), calls_before);
    assert!(h.manager.queue().lock().unwrap().sync_error().unwrap().contains("exhausted"));

    let report = completed(h.manager.retry_failed().await.unwrap());
    assert_eq!(report.attempted, 1);
    assert_eq!(report.synced, 1);
    assert!(record(&h, &op.id).synced);
    assert_eq!(h.manager.status(), SyncStatus::Synced);
}

#[tokio::test]
async fn third_failure_reports_exhaustion() {
    let h = Harness::new();
    h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "x"})), "t-1");
    h.remote.fail_writes(3);

    let first = completed(h.manager.sync_all().await.unwrap());
    let second = completed(h.manager.sync_all().await.unwrap());
    let third = completed(h.manager.sync_all().await.unwrap());

    assert_eq!((first.failed, first.exhausted), (1, 0));
    assert_eq!((second.failed, second.exhausted), (1, 0));
    assert_eq!((third.failed, third.exhausted), (0, 1));
}

#[tokio::test]
async fn delete_of_missing_row_succeeds() {
    let h = Harness::new();
    let op = h.enqueue(OpKind::Delete, Table::Distractions, Payload::new(), "gone");

    let report = completed(h.manager.sync_all().await.unwrap());

    assert_eq!(report.synced, 1);
    assert!(record(&h, &op.id).synced);
    assert_eq!(h.remote.methods(), vec!["select_one"]);
    assert!(h.manager.queue().lock().unwrap().sync_error().is_none());
}

#[tokio::test]
async fn delete_removes_existing_row() {
    let h = Harness::new();
    h.remote.seed_row(Table::Tasks, remote_row("t-1", 500, "doomed"));
    h.remote.seed_row(Table::Tasks, remote_row("t-2", 500, "kept"));
    h.enqueue(OpKind::Delete, Table::Tasks, Payload::new(), "t-1");

    completed(h.manager.sync_all().await.unwrap());

    let rows = h.remote.rows(Table::Tasks);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["local_id"], "t-2");
}

#[tokio::test]
async fn update_of_missing_row_becomes_create() {
    let h = Harness::new();
    let op = h.enqueue(OpKind::Update, Table::SleepRecords, payload(json!({"hours": 7})), "s-1");

    let report = completed(h.manager.sync_all().await.unwrap());

    assert_eq!(report.synced, 1);
    assert!(record(&h, &op.id).synced);
    assert_eq!(h.remote.methods(), vec!["select_one", "insert", "upsert_metadata"]);
    assert!(h.remote.metadata(Table::SleepRecords, "s-1").is_some());
    let rows = h.remote.rows(Table::SleepRecords);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["hours"], 7);
}

#[tokio::test]
async fn create_row_carries_owner_and_local_id() {
    let h = Harness::new();
    h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "write"})), "t-1");

    completed(h.manager.sync_all().await.unwrap());

    let row = &h.remote.rows(Table::Tasks)[0];
    assert_eq!(row.len(), 4);
    assert_eq!(row["title"], "write");
    assert_eq!(row["user_id"], USER);
    assert_eq!(row["local_id"], "t-1");
}

#[tokio::test(start_paused = true)]
async fn retry_waits_for_backoff_before_dispatch() {
    let h = Harness::new();
    h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "x"})), "t-1");
    fail_times(&h, 2).await;

    let calls_before = h.remote.calls().len();
    let started = Instant::now();
    completed(h.manager.retry_failed().await.unwrap());

    let retried = &h.remote.calls()[calls_before];
    assert_eq!(retried.method, "select_one");
    let waited = retried.at.duration_since(started);
    assert!(waited >= Duration::from_millis(4_000), "waited {waited:?}");
    assert!(waited < Duration::from_millis(4_100), "waited {waited:?}");
}

#[tokio::test]
async fn retry_skips_operations_that_never_failed() {
    let h = Harness::new();
    h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "x"})), "t-1");

    let report = completed(h.manager.retry_failed().await.unwrap());

    assert_eq!(report.attempted, 0);
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn create_retried_after_committed_insert_does_not_duplicate_row() {
    let h = Harness::new();
    let op = h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "x"})), "t-1");
    h.remote.fail_metadata_writes(1);

    let first = completed(h.manager.sync_all().await.unwrap());
    assert_eq!(first.failed, 1);
    assert_eq!(record(&h, &op.id).retry_count, 1);
    assert_eq!(h.remote.rows(Table::Tasks).len(), 1);

    let second = completed(h.manager.sync_all().await.unwrap());
    assert_eq!(second.synced, 1);
    assert!(record(&h, &op.id).synced);
    assert_eq!(h.remote.rows(Table::Tasks).len(), 1);
    assert!(h.remote.metadata(Table::Tasks, "t-1").is_some());
    assert_eq!(
        h.remote.methods(),
        vec!["insert", "upsert_metadata", "select_one", "upsert_metadata"]
    );
}

#[tokio::test]
async fn retried_create_inserts_when_no_row_landed() {
    let h = Harness::new();
    let op = h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "x"})), "t-1");
    fail_times(&h, 1).await;
    assert!(h.remote.rows(Table::Tasks).is_empty());

    completed(h.manager.sync_all().await.unwrap());

    assert!(record(&h, &op.id).synced);
    assert_eq!(h.remote.rows(Table::Tasks).len(), 1);
}

#[tokio::test]
async fn queue_save_failure_still_clears_syncing_and_records_error() {
    let store = FailingStore::default();
    let h = Harness::with_store(store.clone());
    h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "x"})), "t-1");
    store.set_failing(true);

    let result = h.manager.sync_all().await;

    assert!(matches!(result, Err(SyncError::Queue(_))));
    assert!(!h.manager.is_syncing());
    {
        let queue = h.manager.queue().lock().unwrap();
        assert!(!queue.is_syncing());
        assert!(queue.sync_error().unwrap().contains("disk full"));
    }
    assert_eq!(h.manager.status(), SyncStatus::Error);
}

#[tokio::test]
async fn offline_update_queued_after_create_loses_to_pass_time_metadata() {
    // Create stamps serverUpdatedAt with the drain time, which is later than
    // the queued update, so last-write-wins drops the device's own update.
    let h = Harness::new();
    h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "draft"})), "t-1");
    let update =
        h.enqueue(OpKind::Update, Table::Tasks, payload(json!({"title": "final"})), "t-1");
    h.clock.advance(60_000);

    let report = completed(h.manager.sync_all().await.unwrap());

    assert_eq!((report.synced, report.discarded), (1, 1));
    assert!(record(&h, &update.id).synced);
    assert_eq!(h.remote.rows(Table::Tasks)[0]["title"], "draft");
    let metadata = h.remote.metadata(Table::Tasks, "t-1").unwrap();
    assert!(metadata.server_updated_at > update.created_at);
}

#[tokio::test]
async fn one_failure_does_not_abort_the_pass() {
    let h = Harness::new();
    let a = h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "a"})), "a");
    let b = h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "b"})), "b");
    h.remote.fail_writes(1);

    let report = completed(h.manager.sync_all().await.unwrap());

    assert_eq!(report.failed, 1);
    assert_eq!(report.synced, 1);
    let a = record(&h, &a.id);
    assert_eq!(a.retry_count, 1);
    assert_eq!(a.last_error.as_deref(), Some("network error: connection reset"));
    assert!(record(&h, &b.id).synced);
    assert_eq!(h.manager.status(), SyncStatus::Pending);
}

#[tokio::test]
async fn signed_out_pass_keeps_retry_budget() {
    let h = Harness::with_identity(StaticIdentity::signed_out());
    let op = h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "x"})), "t-1");

    let report = completed(h.manager.sync_all().await.unwrap());

    assert_eq!(report.failed, 1);
    let op = record(&h, &op.id);
    assert_eq!(op.retry_count, 0);
    assert_eq!(op.last_error.as_deref(), Some("not authenticated"));
    assert!(h.remote.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn hung_call_times_out_and_counts_as_failure() {
    let config = SyncConfig {
        request_timeout_ms: 50,
        ..SyncConfig::default()
    };
    let h = Harness::with_config(config, StaticIdentity::signed_in(USER));
    h.remote.set_latency(Duration::from_secs(60));
    let op = h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "x"})), "t-1");

    let report = completed(h.manager.sync_all().await.unwrap());

    assert_eq!(report.failed, 1);
    let op = record(&h, &op.id);
    assert_eq!(op.retry_count, 1);
    assert_eq!(op.last_error.as_deref(), Some("remote call timed out after 50ms"));
    assert!(!h.manager.is_syncing());
}

#[tokio::test]
async fn enqueue_during_pass_waits_for_next_pass() {
    let h = Harness::new();
    h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "a"})), "a");

    let (outcome, late) = tokio::join!(h.manager.sync_all(), async {
        tokio::task::yield_now().await;
        h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "b"})), "b")
    });

    assert_eq!(completed(outcome.unwrap()).attempted, 1);
    assert!(record(&h, &late.id).is_pending());

    let report = completed(h.manager.sync_all().await.unwrap());
    assert_eq!(report.attempted, 1);
    assert!(record(&h, &late.id).synced);
}

#[tokio::test]
async fn pass_records_last_sync_time() {
    let h = Harness::new();
    h.clock.set(42_000);

    completed(h.manager.sync_all().await.unwrap());

    assert_eq!(h.manager.queue().lock().unwrap().last_sync_time(), Some(42_000));
    assert_eq!(h.manager.snapshot().last_sync_time, Some(42_000));
}

#[tokio::test]
async fn mark_fresh_returns_operation_to_automatic_passes() {
    let h = Harness::new();
    let op = h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "x"})), "t-1");
    fail_times(&h, 3).await;

    h.manager.mark_fresh(&op.id).unwrap();
    assert_eq!(record(&h, &op.id).retry_count, 0);

    let report = completed(h.manager.sync_all().await.unwrap());
    assert_eq!(report.synced, 1);
}

#[test]
fn status_reflects_flags_in_priority_order() {
    let h = Harness::new();
    assert_eq!(h.manager.status(), SyncStatus::Synced);

    h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "x"})), "t-1");
    assert_eq!(h.manager.status(), SyncStatus::Pending);

    h.manager.queue().lock().unwrap().set_sync_error(Some("boom".to_string())).unwrap();
    assert_eq!(h.manager.status(), SyncStatus::Error);

    h.manager.set_online(false);
    assert_eq!(h.manager.status(), SyncStatus::Offline);

    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.status, SyncStatus::Offline);
    assert_eq!(snapshot.pending, 1);
    assert_eq!(snapshot.exhausted, 0);
    assert_eq!(snapshot.last_error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn enqueue_wakes_waiters() {
    let h = Harness::new();
    let notified = h.manager.enqueued();
    h.enqueue(OpKind::Create, Table::Tasks, payload(json!({"title": "x"})), "t-1");
    tokio::time::timeout(Duration::from_secs(1), notified).await.unwrap();
}

#[test]
fn write_local_mirrors_store_and_queue() {
    let h = Harness::new();
    let mut store = ebb_core::SqliteLocalStore::open_in_memory().unwrap();

    let (local, op) = h
        .manager
        .write_local(&mut store, |w| w.create(Table::Tasks, payload(json!({"title": "x"}))))
        .unwrap();

    assert_eq!(op.local_id, local.local_id);
    assert_eq!(op.kind, OpKind::Create);
    assert!(store.get(Table::Tasks, &local.local_id).unwrap().is_some());
    assert_eq!(h.manager.queue().lock().unwrap().unsynced_count(), 1);
}

#[yare::parameterized(
    first = { 0, 1_000 },
    second = { 1, 2_000 },
    third = { 2, 4_000 },
    capped = { 5, 30_000 },
)]
fn config_backoff_uses_defaults(retry_count: u32, expected_ms: u64) {
    assert_eq!(
        SyncConfig::default().backoff_delay(retry_count),
        Duration::from_millis(expected_ms)
    );
}

#[test]
fn status_labels() {
    assert_eq!(SyncStatus::Syncing.to_string(), "syncing");
    assert_eq!(SyncStatus::Offline.as_str(), "offline");
    assert_eq!(SyncStatus::Synced.to_string(), "synced");
}
