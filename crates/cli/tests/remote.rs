// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

mod common;
use common::*;

#[test]
fn sync_without_remote_explains_setup() {
    let temp = TempDir::new().unwrap();

    ebb(&temp)
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("remote is not configured"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn pull_without_remote_fails() {
    let temp = TempDir::new().unwrap();

    ebb(&temp)
        .arg("pull")
        .assert()
        .failure()
        .stderr(predicate::str::contains("remote is not configured"));
}

#[test]
fn sync_with_nothing_pending_succeeds_offline() {
    let temp = TempDir::new().unwrap();
    write_unreachable_remote(&temp);

    ebb(&temp)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sync: 0 attempted"))
        .stdout(predicate::str::contains("Status: synced"));
}

#[test]
fn unreachable_remote_counts_a_failed_attempt() {
    let temp = TempDir::new().unwrap();
    write_unreachable_remote(&temp);
    seed_queue(&temp, &[("1767225600000-aaaaaaaaa", "a", 0)]);

    ebb(&temp)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 attempted"))
        .stdout(predicate::str::contains("1 failed"))
        .stdout(predicate::str::contains("Status: pending"));

    let queue = read_queue(&temp);
    let record = &queue["queue"][0];
    assert_eq!(record["retryCount"], 1);
    assert_eq!(record["synced"], false);
    assert!(record["lastError"].as_str().unwrap().starts_with("network error"));
    assert_eq!(queue["isSyncing"], false);
    assert!(queue["lastSyncTime"].is_u64());
}

#[test]
fn exhausted_operation_is_skipped_by_sync() {
    let temp = TempDir::new().unwrap();
    write_unreachable_remote(&temp);
    seed_queue(&temp, &[("1767225600000-aaaaaaaaa", "a", 3)]);

    ebb(&temp)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 attempted"))
        .stdout(predicate::str::contains("Status: error"))
        .stdout(predicate::str::contains("exhausted"));

    assert_eq!(read_queue(&temp)["queue"][0]["retryCount"], 3);
}

#[test]
fn pull_from_unreachable_remote_is_swallowed() {
    let temp = TempDir::new().unwrap();
    write_unreachable_remote(&temp);

    ebb(&temp)
        .arg("pull")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pull: 0 applied"))
        .stdout(predicate::str::contains("Pull failed for: tasks"));
}

#[test]
fn configure_enables_remote_commands() {
    let temp = TempDir::new().unwrap();

    ebb(&temp)
        .args(["configure", "--url", "http://127.0.0.1:9", "--api-key", "anon", "--user-id", "u-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Remote: http://127.0.0.1:9/rest/v1"));
    assert!(config_path(&temp).exists());

    ebb(&temp)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sync: 0 attempted"));
}
