//! Sync engine
//!
//! Drives the upload and download phases against a [`RemoteEndpoint`].
//! `sync()` never returns Err: every failure lands in
//! [`SyncResult::errors`] so a broken remote cannot take the process down.
//!
//! The engine assumes a single logical thread of control, like the store.
//! The `syncing` flag is an advisory guard against re-entrant invocations
//! (a tick firing mid-sync, a command issued twice), not a real lock.
//! Auto-sync is cooperative: the host loop calls [`SyncEngine::tick`] and
//! the engine decides whether the timer is due.

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::changelog::ChangeLog;
use crate::models::{ChangeAction, ChangeLogRecord, EntityType, SyncResult};
use crate::repo::{CoursewareRepo, QuestionRepo};
use crate::storage::StoreResult;
use crate::store::Store;
use crate::sync::config::{SyncConfig, SyncConfigUpdate};
use crate::sync::remote::{RemoteEndpoint, UploadRequest};
use crate::sync::SyncDirection;

/// Periodic schedule for auto-sync
#[derive(Debug)]
struct AutoSyncTimer {
    interval: Duration,
    next_due: Instant,
}

impl AutoSyncTimer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: Instant::now() + interval,
        }
    }

    fn due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    fn rearm(&mut self, now: Instant) {
        self.next_due = now + self.interval;
    }
}

/// Change-tracking sync engine over the store and a remote endpoint
pub struct SyncEngine<'a, R: RemoteEndpoint> {
    store: &'a Store,
    remote: R,
    config: RefCell<SyncConfig>,
    config_path: PathBuf,
    /// Advisory re-entrancy guard
    syncing: Cell<bool>,
    timer: RefCell<Option<AutoSyncTimer>>,
}

impl<'a, R: RemoteEndpoint> SyncEngine<'a, R> {
    pub fn new(
        store: &'a Store,
        remote: R,
        config: SyncConfig,
        config_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            remote,
            config: RefCell::new(config),
            config_path: config_path.into(),
            syncing: Cell::new(false),
            timer: RefCell::new(None),
        }
    }

    /// Current sync configuration
    pub fn config(&self) -> SyncConfig {
        self.config.borrow().clone()
    }

    /// Run one sync pass
    ///
    /// Returns immediately without touching any record when a sync is
    /// already in flight or no endpoint is configured.
    pub fn sync(&self, direction: SyncDirection) -> SyncResult {
        if self.syncing.get() {
            return SyncResult::failure("sync already in progress");
        }
        if self.config.borrow().endpoint.is_none() {
            return SyncResult::failure("no server configured");
        }

        self.syncing.set(true);
        let result = self.run(direction);
        self.syncing.set(false);
        result
    }

    fn run(&self, direction: SyncDirection) -> SyncResult {
        let mut result = SyncResult::new();

        if direction.includes_upload() {
            self.upload_phase(&mut result);
        }
        if direction.includes_download() {
            self.download_phase(&mut result);
        }

        result.success = result.errors.is_empty();
        result.completed_at = Utc::now();
        info!(
            uploaded = result.uploaded,
            downloaded = result.downloaded,
            conflicts = result.conflicts,
            success = result.success,
            "sync finished"
        );
        result
    }

    /// Push pending records FIFO; a failed upload never aborts the pass
    fn upload_phase(&self, result: &mut SyncResult) {
        let log = ChangeLog::new(self.store);
        let pending = match log.pending() {
            Ok(records) => records,
            Err(e) => {
                result.errors.push(format!("failed to read pending changes: {}", e));
                return;
            }
        };

        for record in pending {
            let data = match self.snapshot(&record) {
                Ok(data) => data,
                Err(e) => {
                    result.errors.push(format!(
                        "failed to snapshot {} {}: {}",
                        record.entity_type, record.entity_id, e
                    ));
                    continue;
                }
            };

            let request = UploadRequest {
                entity_type: record.entity_type,
                entity_id: record.entity_id.clone(),
                action: record.action,
                data,
            };

            match self.remote.upload(&request) {
                Ok(()) => {
                    if let Err(e) = log.mark_synced(&record.id, Utc::now()) {
                        result
                            .errors
                            .push(format!("failed to mark {} synced: {}", record.id, e));
                        continue;
                    }
                    result.uploaded += 1;
                }
                Err(err) => {
                    let message = err.to_string();
                    warn!(
                        entity_type = %record.entity_type,
                        entity_id = %record.entity_id,
                        error = %message,
                        "upload failed"
                    );
                    if let Err(e) = log.mark_failed(&record.id, &message) {
                        result
                            .errors
                            .push(format!("failed to mark {} failed: {}", record.id, e));
                    }
                    result.errors.push(format!(
                        "upload {} {} failed: {}",
                        record.entity_type, record.entity_id, message
                    ));
                }
            }
        }
    }

    /// Pull remote changes newer than the high-water mark
    ///
    /// A remote change conflicts when a pending local record for the same
    /// entity carries a newer local_updated_at; conflicts are counted and
    /// logged, the local intent wins. Everything else is counted as
    /// downloaded (application of remote rows is left to the repositories'
    /// write path and is currently a logged no-op).
    fn download_phase(&self, result: &mut SyncResult) {
        let log = ChangeLog::new(self.store);

        let since = match log.latest_remote_updated_at() {
            Ok(mark) => mark.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            Err(e) => {
                result
                    .errors
                    .push(format!("failed to read sync high-water mark: {}", e));
                return;
            }
        };

        let changes = match self.remote.get_changes(since) {
            Ok(changes) => changes,
            Err(err) => {
                warn!(error = %err, "download failed");
                result.errors.push(format!("download failed: {}", err));
                return;
            }
        };

        for change in changes {
            match log.pending_for(change.entity_type, &change.entity_id) {
                Ok(Some(local)) if local.local_updated_at > change.updated_at => {
                    warn!(
                        entity_type = %change.entity_type,
                        entity_id = %change.entity_id,
                        local = %local.local_updated_at,
                        remote = %change.updated_at,
                        "conflict: local change is newer, keeping local"
                    );
                    result.conflicts += 1;
                }
                Ok(_) => {
                    debug!(
                        entity_type = %change.entity_type,
                        entity_id = %change.entity_id,
                        "applying remote change"
                    );
                    result.downloaded += 1;
                }
                Err(e) => {
                    result.errors.push(format!(
                        "failed to check pending record for {} {}: {}",
                        change.entity_type, change.entity_id, e
                    ));
                }
            }
        }
    }

    /// Entity snapshot for an upload; None for deletes and vanished rows
    fn snapshot(&self, record: &ChangeLogRecord) -> StoreResult<Option<Value>> {
        if record.action == ChangeAction::Delete {
            return Ok(None);
        }

        let snapshot = match record.entity_type {
            EntityType::Courseware => CoursewareRepo::new(self.store)
                .get(&record.entity_id)?
                .and_then(|c| serde_json::to_value(c).ok()),
            EntityType::Question => QuestionRepo::new(self.store)
                .get(&record.entity_id)?
                .and_then(|q| serde_json::to_value(q).ok()),
        };
        Ok(snapshot)
    }

    /// Reset every failed record to pending, then run one upload-only pass
    pub fn retry_failed(&self) -> SyncResult {
        let log = ChangeLog::new(self.store);
        match log.reset_failed() {
            Ok(count) => {
                info!(count, "reset failed records to pending");
                self.sync(SyncDirection::Upload)
            }
            Err(e) => SyncResult::failure(format!("failed to reset failed records: {}", e)),
        }
    }

    /// Arm (or disarm) the auto-sync timer from the current config
    ///
    /// Cancels any existing schedule first.
    pub fn setup_auto_sync(&self) {
        let config = self.config.borrow();
        let mut timer = self.timer.borrow_mut();

        if config.auto_sync && config.interval_minutes > 0 {
            let interval = Duration::from_secs(config.interval_minutes * 60);
            *timer = Some(AutoSyncTimer::new(interval));
            debug!(interval_minutes = config.interval_minutes, "auto-sync armed");
        } else {
            *timer = None;
            debug!("auto-sync disarmed");
        }
    }

    /// Host-driven timer tick
    ///
    /// Runs `sync(Both)` when the timer is due and rearms it. A failed
    /// scheduled sync is logged, never propagated.
    pub fn tick(&self, now: Instant) -> Option<SyncResult> {
        {
            let mut timer = self.timer.borrow_mut();
            let timer = timer.as_mut()?;
            if !timer.due(now) {
                return None;
            }
            timer.rearm(now);
        }

        let result = self.sync(SyncDirection::Both);
        if !result.success {
            warn!(errors = ?result.errors, "scheduled sync failed");
        }
        Some(result)
    }

    /// Merge a partial update into the config and persist it
    ///
    /// Rearms the auto-sync timer when the flag or interval changed.
    pub fn save_config(&self, update: SyncConfigUpdate) -> Result<SyncConfig> {
        let schedule_changed = {
            let mut config = self.config.borrow_mut();
            let changed = update.apply(&mut config);
            config.save(&self.config_path)?;
            changed
        };

        if schedule_changed {
            self.setup_auto_sync();
        }
        Ok(self.config())
    }
}
