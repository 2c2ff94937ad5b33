// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod configure;
pub mod maintenance;
pub mod status;
pub mod sync;

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use ebb_core::{SqliteLocalStore, SyncQueue};

use crate::config::{default_config_path, local_db_path, lock_path, queue_path, Config};
use crate::error::{Error, Result};
use crate::sync::{shared, RestBackend, StaticIdentity, SyncManager};

/// Manager type the CLI drives.
pub type CliManager = SyncManager<RestBackend, StaticIdentity>;

/// Everything a command needs: resolved config, state directory and the
/// single-writer lock on it (held until the context is dropped).
pub struct Context {
    pub config: Config,
    pub config_path: PathBuf,
    pub state_dir: PathBuf,
    _lock: File,
}

impl Context {
    /// Loads config, creates the state directory and locks it.
    pub fn open(config_path: Option<&Path>, state_dir: Option<&Path>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };
        let config = Config::load(&config_path)?;
        let state_dir = config.state_dir(state_dir)?;
        fs::create_dir_all(&state_dir)?;
        let lock = acquire_lock(&lock_path(&state_dir))?;
        tracing::debug!(state_dir = %state_dir.display(), "opened state directory");

        Ok(Context {
            config,
            config_path,
            state_dir,
            _lock: lock,
        })
    }

    pub fn open_queue(&self) -> Result<SyncQueue> {
        Ok(SyncQueue::open_file(&queue_path(&self.state_dir))?)
    }

    pub fn open_local_store(&self) -> Result<SqliteLocalStore> {
        Ok(SqliteLocalStore::open(&local_db_path(&self.state_dir))?)
    }

    /// Builds a manager over the on-disk queue and the configured remote.
    pub fn manager(&self) -> Result<CliManager> {
        let remote = self
            .config
            .remote
            .as_ref()
            .ok_or_else(|| Error::NotConfigured(self.config_path.display().to_string()))?;
        let backend =
            RestBackend::new(&remote.url, remote.api_key.clone(), remote.access_token.clone())?;
        let identity = StaticIdentity::new(remote.user_id.clone());
        let queue = shared(self.open_queue()?);
        Ok(SyncManager::new(self.config.sync_config(), queue, backend, identity))
    }
}

fn acquire_lock(lock_path: &Path) -> Result<File> {
    use fs2::FileExt;

    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(lock_path)?;
    file.try_lock_exclusive()
        .map_err(|_| Error::Locked(lock_path.display().to_string()))?;
    Ok(file)
}

/// Formats ms since epoch for humans.
pub fn format_time(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
