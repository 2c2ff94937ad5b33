// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// `ebb` with config and state isolated inside `temp`.
pub fn ebb(temp: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("ebb");
    cmd.arg("--config")
        .arg(config_path(temp))
        .arg("--state-dir")
        .arg(state_dir(temp))
        .env_remove("RUST_LOG");
    cmd
}

pub fn config_path(temp: &TempDir) -> PathBuf {
    temp.path().join("config.toml")
}

pub fn state_dir(temp: &TempDir) -> PathBuf {
    temp.path().join("state")
}

pub fn write_config(temp: &TempDir, content: &str) {
    std::fs::write(config_path(temp), content).unwrap();
}

/// Configures a remote nobody listens on, so every call fails fast.
pub fn write_unreachable_remote(temp: &TempDir) {
    write_config(
        temp,
        r#"
[remote]
url = "http://127.0.0.1:9"
api_key = "anon"
user_id = "u-1"

[sync]
request_timeout_ms = 5000
"#,
    );
}

/// Writes a queue blob with one unsynced record per `(id, local_id, retry_count)`.
pub fn seed_queue(temp: &TempDir, records: &[(&str, &str, u32)]) {
    let queue: Vec<serde_json::Value> = records
        .iter()
        .map(|(id, local_id, retry_count)| {
            serde_json::json!({
                "id": id,
                "kind": "create",
                "table": "tasks",
                "payload": {"title": local_id},
                "localId": local_id,
                "createdAt": 1_767_225_600_000u64,
                "retryCount": retry_count,
                "lastError": null,
                "synced": false,
            })
        })
        .collect();
    let state = serde_json::json!({
        "queue": queue,
        "isSyncing": false,
        "lastSyncTime": null,
        "syncError": null,
    });
    std::fs::create_dir_all(state_dir(temp)).unwrap();
    std::fs::write(state_dir(temp).join("queue.json"), state.to_string()).unwrap();
}

pub fn read_queue(temp: &TempDir) -> serde_json::Value {
    let content = std::fs::read_to_string(state_dir(temp).join("queue.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}
