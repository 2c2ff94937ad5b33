// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable storage for the sync queue blob.
//!
//! The whole queue state is one JSON document. [`FileStore`] writes it to a
//! temp file, fsyncs, then renames over the old blob so a crash never leaves
//! a half-written queue behind.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::queue::QueueState;

/// Backend that persists the queue state blob.
pub trait QueueStore: Send {
    /// Loads the last saved state, or `None` on first run.
    fn load(&self) -> Result<Option<QueueState>>;

    /// Durably replaces the saved state.
    fn save(&mut self, state: &QueueState) -> Result<()>;
}

/// Queue blob stored as a JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Creates a store backed by `path`. The file is created on first save.
    pub fn new(path: &Path) -> Self {
        FileStore {
            path: path.to_path_buf(),
        }
    }

    /// Returns the blob path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl QueueStore for FileStore {
    fn load(&self) -> Result<Option<QueueState>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&mut self, state: &QueueState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp = self.temp_path();
        let json = serde_json::to_string(state)?;
        let mut file = File::create(&temp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp, &self.path)?;

        Ok(())
    }
}

/// In-memory queue blob.
///
/// State still goes through JSON on every save, so a store reopened from a
/// clone sees exactly what a restart would. Clones share the same blob.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blob: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw serialized blob, if anything was saved.
    pub fn raw(&self) -> Option<String> {
        self.blob.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl QueueStore for MemoryStore {
    fn load(&self) -> Result<Option<QueueState>> {
        match self.raw() {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, state: &QueueState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        *self.blob.lock().unwrap_or_else(|e| e.into_inner()) = Some(json);
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
