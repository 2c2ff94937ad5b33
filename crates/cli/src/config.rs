// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! CLI configuration management.
//!
//! Configuration is stored in `config.toml` under the user config directory
//! and includes:
//! - `state_dir`: where the queue, local store and lock file live
//! - `[remote]`: endpoint, key and identity for the REST backend
//! - `[sync]`: retry ceiling, backoff and per-call timeout

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::sync::SyncConfig;

const APP_DIR_NAME: &str = "ebb";
const CONFIG_FILE_NAME: &str = "config.toml";
const QUEUE_FILE_NAME: &str = "queue.json";
const LOCAL_DB_FILE_NAME: &str = "local.db";
const LOCK_FILE_NAME: &str = "ebb.lock";

/// Configuration stored in `config.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory for queue and local store (default: user data dir).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    /// Remote backend settings (if absent, only local commands work).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Remote backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    /// Project URL; `/rest/v1` is appended when missing.
    pub url: String,
    pub api_key: String,
    /// Bearer token for row-level security (defaults to the API key).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Signed-in user. Sync fails closed without it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Sync tuning, mirrored into [`SyncConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncSettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// 0 disables the timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_max_retries() -> u32 {
    SyncConfig::default().max_retries
}

fn default_backoff_base_ms() -> u64 {
    SyncConfig::default().backoff_base_ms
}

fn default_backoff_max_ms() -> u64 {
    SyncConfig::default().backoff_max_ms
}

fn default_request_timeout_ms() -> u64 {
    SyncConfig::default().request_timeout_ms
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl From<&SyncSettings> for SyncConfig {
    fn from(settings: &SyncSettings) -> Self {
        SyncConfig {
            max_retries: settings.max_retries,
            backoff_base_ms: settings.backoff_base_ms,
            backoff_max_ms: settings.backoff_max_ms,
            request_timeout_ms: settings.request_timeout_ms,
        }
    }
}

impl Config {
    /// Loads configuration from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => return Err(e.into()),
        };
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.sync.max_retries == 0 {
            return Err(Error::Config("sync.max_retries must be at least 1".to_string()));
        }
        if self.sync.backoff_base_ms > self.sync.backoff_max_ms {
            return Err(Error::Config(
                "sync.backoff_base_ms must not exceed sync.backoff_max_ms".to_string(),
            ));
        }
        if let Some(remote) = &self.remote {
            if remote.url.trim().is_empty() {
                return Err(Error::Config("remote.url must not be empty".to_string()));
            }
        }
        Ok(())
    }

    /// Manager settings derived from `[sync]`.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::from(&self.sync)
    }

    /// Resolves the state directory: explicit override, then config, then
    /// the platform data directory.
    pub fn state_dir(&self, override_dir: Option<&Path>) -> Result<PathBuf> {
        if let Some(dir) = override_dir {
            return Ok(dir.to_path_buf());
        }
        if let Some(dir) = &self.state_dir {
            return Ok(dir.clone());
        }
        default_state_dir()
    }
}

/// Default config file: `<config dir>/ebb/config.toml`.
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or_else(|| Error::Config("cannot determine the user config directory".to_string()))
}

/// Default state directory: `<local data dir>/ebb`.
pub fn default_state_dir() -> Result<PathBuf> {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| Error::Config("cannot determine the user data directory".to_string()))
}

pub fn queue_path(state_dir: &Path) -> PathBuf {
    state_dir.join(QUEUE_FILE_NAME)
}

pub fn local_db_path(state_dir: &Path) -> PathBuf {
    state_dir.join(LOCAL_DB_FILE_NAME)
}

pub fn lock_path(state_dir: &Path) -> PathBuf {
    state_dir.join(LOCK_FILE_NAME)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
