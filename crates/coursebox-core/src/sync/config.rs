//! Sync configuration side file
//!
//! Lives as a small JSON file next to the store image (see
//! [`crate::config::Config::sync_config_path`]). Loading merges defaults
//! under any missing keys, so a file written by an older version keeps
//! working.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_interval_minutes() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

/// Remote sync settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Remote endpoint address; sync is disabled while unset
    pub endpoint: Option<String>,
    /// Bearer credential sent with every request
    pub credential: Option<String>,
    /// Arm the periodic auto-sync timer
    pub auto_sync: bool,
    /// Auto-sync period in minutes
    pub interval_minutes: u64,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            credential: None,
            auto_sync: false,
            interval_minutes: default_interval_minutes(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SyncConfig {
    /// Load from the side file, defaults merged under missing keys
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read sync config: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse sync config: {:?}", path))
    }

    /// Persist to the side file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize sync config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write sync config: {:?}", path))?;
        Ok(())
    }
}

/// Partial update merged into a [`SyncConfig`]
///
/// `Some(None)` on endpoint/credential clears the value.
#[derive(Debug, Clone, Default)]
pub struct SyncConfigUpdate {
    pub endpoint: Option<Option<String>>,
    pub credential: Option<Option<String>>,
    pub auto_sync: Option<bool>,
    pub interval_minutes: Option<u64>,
    pub timeout_secs: Option<u64>,
}

impl SyncConfigUpdate {
    /// Merge into `config`
    ///
    /// Returns true when the auto-sync schedule (flag or interval) changed,
    /// meaning the timer must be rearmed.
    pub fn apply(&self, config: &mut SyncConfig) -> bool {
        let mut schedule_changed = false;

        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(credential) = &self.credential {
            config.credential = credential.clone();
        }
        if let Some(auto_sync) = self.auto_sync {
            if config.auto_sync != auto_sync {
                schedule_changed = true;
            }
            config.auto_sync = auto_sync;
        }
        if let Some(interval) = self.interval_minutes {
            if config.interval_minutes != interval {
                schedule_changed = true;
            }
            config.interval_minutes = interval;
        }
        if let Some(timeout) = self.timeout_secs {
            config.timeout_secs = timeout;
        }

        schedule_changed
    }
}
