//! Change log / outbox
//!
//! Tracks which local mutations still need to reach the remote endpoint.
//! The log holds the *latest outstanding intent* per entity, not a full
//! mutation history: at most one pending record exists per
//! (entity_type, entity_id), and a new mutation overwrites that record's
//! action and local_updated_at in place.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use tracing::debug;

use crate::models::{new_entity_id, ChangeAction, ChangeLogRecord, EntityType, SyncStatus};
use crate::storage::StoreResult;
use crate::store::Store;

const COLUMNS: &str = "id, entity_type, entity_id, action, sync_status, local_updated_at, \
                       remote_updated_at, error_message, created_at";

/// Record counts grouped by sync status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeLogStats {
    pub pending: i64,
    pub synced: i64,
    pub failed: i64,
}

/// Outbox over the store
pub struct ChangeLog<'a> {
    store: &'a Store,
}

impl<'a> ChangeLog<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Create the log table if it is missing
    ///
    /// Invoked before every read or write so the log works even against an
    /// image created before the table existed.
    fn ensure_table(&self) -> StoreResult<()> {
        let exists = self
            .store
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name='change_log'",
                [],
                |row| row.get::<_, i64>(0),
            )?
            .is_some();
        if exists {
            return Ok(());
        }

        self.store.execute(
            "CREATE TABLE IF NOT EXISTS change_log (
                id TEXT PRIMARY KEY,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                action TEXT NOT NULL,
                sync_status TEXT NOT NULL DEFAULT 'pending',
                local_updated_at TEXT NOT NULL,
                remote_updated_at TEXT,
                error_message TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        self.store.execute(
            "CREATE INDEX IF NOT EXISTS idx_change_log_status
             ON change_log(sync_status, created_at)",
            [],
        )?;
        self.store.execute(
            "CREATE INDEX IF NOT EXISTS idx_change_log_entity
             ON change_log(entity_type, entity_id)",
            [],
        )?;
        Ok(())
    }

    /// Record a local mutation
    ///
    /// When a pending record already exists for the entity, its action and
    /// local_updated_at are overwritten in place (created_at keeps the FIFO
    /// position of the first outstanding intent). Otherwise a fresh pending
    /// record is inserted.
    pub fn record(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        action: ChangeAction,
    ) -> StoreResult<ChangeLogRecord> {
        self.ensure_table()?;
        let now = Utc::now();

        if let Some(existing) = self.pending_for(entity_type, entity_id)? {
            self.store.execute(
                "UPDATE change_log SET action = ?1, local_updated_at = ?2 WHERE id = ?3",
                params![action.as_str(), now, existing.id],
            )?;
            debug!(
                entity_type = %entity_type,
                entity_id,
                action = %action,
                "overwrote pending change record"
            );
            return Ok(ChangeLogRecord {
                action,
                local_updated_at: now,
                ..existing
            });
        }

        let record = ChangeLogRecord {
            id: new_entity_id(),
            entity_type,
            entity_id: entity_id.to_string(),
            action,
            sync_status: SyncStatus::Pending,
            local_updated_at: now,
            remote_updated_at: None,
            error_message: None,
            created_at: now,
        };
        self.store.execute(
            "INSERT INTO change_log (id, entity_type, entity_id, action, sync_status,
                                     local_updated_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.entity_type.as_str(),
                record.entity_id,
                record.action.as_str(),
                record.sync_status.as_str(),
                record.local_updated_at,
                record.created_at,
            ],
        )?;
        Ok(record)
    }

    /// All pending records, FIFO by when the intent was first created
    pub fn pending(&self) -> StoreResult<Vec<ChangeLogRecord>> {
        self.ensure_table()?;
        self.store.query(
            &format!(
                "SELECT {} FROM change_log WHERE sync_status = 'pending'
                 ORDER BY created_at ASC",
                COLUMNS
            ),
            [],
            row_to_record,
        )
    }

    /// The pending record for one entity, if any
    pub fn pending_for(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> StoreResult<Option<ChangeLogRecord>> {
        self.ensure_table()?;
        self.store.query_row(
            &format!(
                "SELECT {} FROM change_log
                 WHERE sync_status = 'pending' AND entity_type = ?1 AND entity_id = ?2",
                COLUMNS
            ),
            params![entity_type.as_str(), entity_id],
            row_to_record,
        )
    }

    /// Record counts grouped by sync status
    pub fn stats(&self) -> StoreResult<ChangeLogStats> {
        self.ensure_table()?;
        let rows: Vec<(String, i64)> = self.store.query(
            "SELECT sync_status, COUNT(*) FROM change_log GROUP BY sync_status",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stats = ChangeLogStats::default();
        for (status, count) in rows {
            match SyncStatus::from_str(&status) {
                SyncStatus::Pending => stats.pending = count,
                SyncStatus::Synced => stats.synced = count,
                SyncStatus::Failed => stats.failed = count,
            }
        }
        Ok(stats)
    }

    /// Delete synced records, optionally only those created before a cutoff
    ///
    /// Pending and failed records are never touched.
    pub fn clean_synced(&self, before: Option<DateTime<Utc>>) -> StoreResult<usize> {
        self.ensure_table()?;
        let result = match before {
            Some(cutoff) => self.store.execute(
                "DELETE FROM change_log WHERE sync_status = 'synced' AND created_at < ?1",
                params![cutoff],
            )?,
            None => self
                .store
                .execute("DELETE FROM change_log WHERE sync_status = 'synced'", [])?,
        };
        Ok(result.changes)
    }

    /// Transition a record to synced, recording the remote acknowledgement time
    pub fn mark_synced(&self, id: &str, remote_updated_at: DateTime<Utc>) -> StoreResult<()> {
        self.ensure_table()?;
        self.store.execute(
            "UPDATE change_log
             SET sync_status = 'synced', remote_updated_at = ?1, error_message = NULL
             WHERE id = ?2",
            params![remote_updated_at, id],
        )?;
        Ok(())
    }

    /// Transition a record to failed with the upload error
    pub fn mark_failed(&self, id: &str, message: &str) -> StoreResult<()> {
        self.ensure_table()?;
        self.store.execute(
            "UPDATE change_log SET sync_status = 'failed', error_message = ?1 WHERE id = ?2",
            params![message, id],
        )?;
        Ok(())
    }

    /// Reset every failed record to pending, clearing its error
    ///
    /// Returns the number of records reset.
    pub fn reset_failed(&self) -> StoreResult<usize> {
        self.ensure_table()?;
        let result = self.store.execute(
            "UPDATE change_log SET sync_status = 'pending', error_message = NULL
             WHERE sync_status = 'failed'",
            [],
        )?;
        Ok(result.changes)
    }

    /// High-water mark for downloads: the newest remote acknowledgement seen
    pub fn latest_remote_updated_at(&self) -> StoreResult<Option<DateTime<Utc>>> {
        self.ensure_table()?;
        Ok(self
            .store
            .query_row(
                "SELECT MAX(remote_updated_at) FROM change_log WHERE sync_status = 'synced'",
                [],
                |row| row.get::<_, Option<DateTime<Utc>>>(0),
            )?
            .flatten())
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ChangeLogRecord> {
    let entity_type: String = row.get(1)?;
    let action: String = row.get(3)?;
    let sync_status: String = row.get(4)?;
    Ok(ChangeLogRecord {
        id: row.get(0)?,
        entity_type: EntityType::from_str(&entity_type),
        entity_id: row.get(2)?,
        action: ChangeAction::from_str(&action),
        sync_status: SyncStatus::from_str(&sync_status),
        local_updated_at: row.get(5)?,
        remote_updated_at: row.get(6)?,
        error_message: row.get(7)?,
        created_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{CoursewareRepo, NewCourseware, NewQuestion, QuestionRepo};
    use tempfile::TempDir;

    fn open_store(temp_dir: &TempDir) -> Store {
        Store::open(temp_dir.path().join("coursebox.db")).unwrap()
    }

    #[test]
    fn test_record_inserts_pending() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let log = ChangeLog::new(&store);

        let record = log
            .record(EntityType::Courseware, "c1", ChangeAction::Create)
            .unwrap();

        assert_eq!(record.sync_status, SyncStatus::Pending);
        assert_eq!(record.action, ChangeAction::Create);
        assert_eq!(record.entity_id, "c1");
        assert_eq!(log.pending().unwrap().len(), 1);
    }

    #[test]
    fn test_merge_law_single_pending_per_entity() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let log = ChangeLog::new(&store);

        let first = log
            .record(EntityType::Courseware, "c1", ChangeAction::Create)
            .unwrap();
        log.record(EntityType::Courseware, "c1", ChangeAction::Update)
            .unwrap();
        let last = log
            .record(EntityType::Courseware, "c1", ChangeAction::Delete)
            .unwrap();

        let pending = log.pending().unwrap();
        assert_eq!(pending.len(), 1);
        // Same record, overwritten in place; FIFO position preserved
        assert_eq!(pending[0].id, first.id);
        assert_eq!(pending[0].action, ChangeAction::Delete);
        assert_eq!(pending[0].created_at, first.created_at);
        assert!(last.local_updated_at >= first.local_updated_at);
    }

    #[test]
    fn test_merge_law_scoped_per_entity_type() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let log = ChangeLog::new(&store);

        // Same id under different entity types stays two records
        log.record(EntityType::Courseware, "x1", ChangeAction::Create)
            .unwrap();
        log.record(EntityType::Question, "x1", ChangeAction::Create)
            .unwrap();

        assert_eq!(log.pending().unwrap().len(), 2);
    }

    #[test]
    fn test_pending_is_fifo_by_created_at() {
        // Scenario: create a courseware, then a question under it
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let log = ChangeLog::new(&store);

        let courseware = CoursewareRepo::new(&store)
            .create(NewCourseware::new("Algebra"))
            .unwrap();
        log.record(EntityType::Courseware, &courseware.id, ChangeAction::Create)
            .unwrap();
        let question = QuestionRepo::new(&store)
            .create(NewQuestion::new(&courseware.id, "single_choice"))
            .unwrap();
        log.record(EntityType::Question, &question.id, ChangeAction::Create)
            .unwrap();

        let pending = log.pending().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].entity_type, EntityType::Courseware);
        assert_eq!(pending[0].entity_id, courseware.id);
        assert_eq!(pending[0].action, ChangeAction::Create);
        assert_eq!(pending[1].entity_type, EntityType::Question);
        assert_eq!(pending[1].entity_id, question.id);
        assert_eq!(pending[1].action, ChangeAction::Create);
    }

    #[test]
    fn test_pending_only_returns_pending() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let log = ChangeLog::new(&store);

        let a = log
            .record(EntityType::Courseware, "c1", ChangeAction::Create)
            .unwrap();
        let b = log
            .record(EntityType::Courseware, "c2", ChangeAction::Create)
            .unwrap();
        log.record(EntityType::Courseware, "c3", ChangeAction::Create)
            .unwrap();

        log.mark_synced(&a.id, Utc::now()).unwrap();
        log.mark_failed(&b.id, "rejected").unwrap();

        let pending = log.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].entity_id, "c3");
        assert!(pending
            .iter()
            .all(|r| r.sync_status == SyncStatus::Pending));
    }

    #[test]
    fn test_synced_record_is_terminal_for_new_mutations() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let log = ChangeLog::new(&store);

        let first = log
            .record(EntityType::Courseware, "c1", ChangeAction::Create)
            .unwrap();
        log.mark_synced(&first.id, Utc::now()).unwrap();

        // A later mutation opens a fresh pending record
        let second = log
            .record(EntityType::Courseware, "c1", ChangeAction::Update)
            .unwrap();
        assert_ne!(second.id, first.id);

        let stats = log.stats().unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.synced, 1);
    }

    #[test]
    fn test_stats_groups_by_status() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let log = ChangeLog::new(&store);

        let a = log
            .record(EntityType::Courseware, "c1", ChangeAction::Create)
            .unwrap();
        let b = log
            .record(EntityType::Question, "q1", ChangeAction::Create)
            .unwrap();
        log.record(EntityType::Question, "q2", ChangeAction::Update)
            .unwrap();

        log.mark_synced(&a.id, Utc::now()).unwrap();
        log.mark_failed(&b.id, "timeout").unwrap();

        assert_eq!(
            log.stats().unwrap(),
            ChangeLogStats {
                pending: 1,
                synced: 1,
                failed: 1
            }
        );
    }

    #[test]
    fn test_clean_synced_spares_pending_and_failed() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let log = ChangeLog::new(&store);

        let a = log
            .record(EntityType::Courseware, "c1", ChangeAction::Create)
            .unwrap();
        let b = log
            .record(EntityType::Courseware, "c2", ChangeAction::Create)
            .unwrap();
        log.record(EntityType::Courseware, "c3", ChangeAction::Create)
            .unwrap();

        log.mark_synced(&a.id, Utc::now()).unwrap();
        log.mark_failed(&b.id, "rejected").unwrap();

        let removed = log.clean_synced(None).unwrap();
        assert_eq!(removed, 1);

        let stats = log.stats().unwrap();
        assert_eq!(stats.synced, 0);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn test_clean_synced_respects_cutoff() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let log = ChangeLog::new(&store);

        let a = log
            .record(EntityType::Courseware, "c1", ChangeAction::Create)
            .unwrap();
        log.mark_synced(&a.id, Utc::now()).unwrap();

        // A cutoff before the record's creation removes nothing
        let removed = log
            .clean_synced(Some(a.created_at - chrono::Duration::seconds(60)))
            .unwrap();
        assert_eq!(removed, 0);

        let removed = log
            .clean_synced(Some(a.created_at + chrono::Duration::seconds(60)))
            .unwrap();
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_reset_failed_clears_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let log = ChangeLog::new(&store);

        let a = log
            .record(EntityType::Courseware, "c1", ChangeAction::Create)
            .unwrap();
        let b = log
            .record(EntityType::Courseware, "c2", ChangeAction::Create)
            .unwrap();
        log.mark_failed(&a.id, "timeout").unwrap();
        log.mark_failed(&b.id, "rejected").unwrap();

        assert_eq!(log.reset_failed().unwrap(), 2);

        let pending = log.pending().unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|r| r.error_message.is_none()));
    }

    #[test]
    fn test_latest_remote_updated_at() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let log = ChangeLog::new(&store);

        assert!(log.latest_remote_updated_at().unwrap().is_none());

        let early = Utc::now() - chrono::Duration::hours(2);
        let late = Utc::now();

        let a = log
            .record(EntityType::Courseware, "c1", ChangeAction::Create)
            .unwrap();
        let b = log
            .record(EntityType::Courseware, "c2", ChangeAction::Create)
            .unwrap();
        log.mark_synced(&a.id, late).unwrap();
        log.mark_synced(&b.id, early).unwrap();

        let mark = log.latest_remote_updated_at().unwrap().unwrap();
        assert_eq!(mark, late);
    }

    #[test]
    fn test_ensure_table_survives_dropped_table() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        store.execute("DROP TABLE change_log", []).unwrap();

        let log = ChangeLog::new(&store);
        assert!(log.pending().unwrap().is_empty());
        log.record(EntityType::Courseware, "c1", ChangeAction::Create)
            .unwrap();
        assert_eq!(log.stats().unwrap().pending, 1);
    }
}
