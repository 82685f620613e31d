//! Persistent store
//!
//! The `Store` owns a single in-memory SQLite image and a durable file it
//! snapshots to. Every mutating statement outside an explicit transaction
//! flushes the **entire** image to disk (whole-image snapshot overwrite, not
//! an incremental log); batching writes inside [`Store::transaction`] is the
//! way to avoid redundant flush cost. This trades write amplification for
//! simplicity and crash-safety on a small single-user dataset.
//!
//! The store assumes a single owning process and a single logical thread of
//! control; there is no internal locking. Nested transactions fail fast
//! rather than silently corrupting flush semantics.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Store::open(config.store_path())?;
//!
//! store.execute(
//!     "INSERT INTO coursewares (id, title, ...) VALUES (?1, ?2, ...)",
//!     params![id, title],
//! )?;
//!
//! let rows = store.query("SELECT id FROM coursewares", [], |row| row.get(0))?;
//! ```

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, DatabaseName, OptionalExtension, Params, Row};
use tracing::debug;

use crate::storage::error::{StoreError, StoreResult};
use crate::storage::schema;

/// Result of one mutating statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteResult {
    /// Number of rows changed
    pub changes: usize,
    /// Rowid of the last inserted row
    pub last_insert_id: i64,
}

/// Durable, serializable storage with explicit transaction boundaries
pub struct Store {
    /// The in-memory relational image
    conn: Connection,
    /// Durable snapshot location
    path: PathBuf,
    /// Set while an explicit transaction is open; suppresses flush-on-write
    in_transaction: Cell<bool>,
    initialized: Cell<bool>,
}

impl Store {
    /// Open the store at the given image path, loading an existing image if
    /// one is present
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Initialization { source: e })?;
        let mut store = Self {
            conn,
            path: path.into(),
            in_transaction: Cell::new(false),
            initialized: Cell::new(false),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Load the on-disk image (if any) and ensure the schema
    ///
    /// Idempotent: a second call is a no-op. On failure the caller may keep
    /// running without persistence.
    pub fn initialize(&mut self) -> StoreResult<()> {
        if self.initialized.get() {
            return Ok(());
        }

        if self.path.exists() {
            self.conn
                .restore(
                    DatabaseName::Main,
                    &self.path,
                    None::<fn(rusqlite::backup::Progress)>,
                )
                .map_err(|e| StoreError::Initialization { source: e })?;
            debug!(path = %self.path.display(), "loaded existing store image");
        }

        schema::init_schema(&self.conn)
            .map_err(|e| StoreError::Initialization { source: e })?;

        self.initialized.set(true);
        Ok(())
    }

    /// Path of the durable image file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    fn ensure_initialized(&self) -> StoreResult<()> {
        if self.initialized.get() {
            Ok(())
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Run a read-only statement and map each row
    ///
    /// Never flushes to disk.
    pub fn query<T, P, F>(&self, statement: &str, params: P, map: F) -> StoreResult<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.ensure_initialized()?;

        let mut stmt = self.conn.prepare(statement).map_err(|e| StoreError::Query {
            statement: statement.to_string(),
            source: e,
        })?;
        let rows = stmt.query_map(params, map).map_err(|e| StoreError::Query {
            statement: statement.to_string(),
            source: e,
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| StoreError::Query {
                statement: statement.to_string(),
                source: e,
            })?);
        }
        Ok(out)
    }

    /// Run a read-only statement expected to yield at most one row
    pub fn query_row<T, P, F>(&self, statement: &str, params: P, map: F) -> StoreResult<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.ensure_initialized()?;

        let mut stmt = self.conn.prepare(statement).map_err(|e| StoreError::Query {
            statement: statement.to_string(),
            source: e,
        })?;
        stmt.query_row(params, map)
            .optional()
            .map_err(|e| StoreError::Query {
                statement: statement.to_string(),
                source: e,
            })
    }

    /// Run one mutating statement
    ///
    /// Outside a transaction the whole image is flushed to disk immediately
    /// after the statement succeeds.
    pub fn execute<P: Params>(&self, statement: &str, params: P) -> StoreResult<ExecuteResult> {
        self.ensure_initialized()?;

        let changes = self
            .conn
            .execute(statement, params)
            .map_err(|e| StoreError::Execute {
                statement: statement.to_string(),
                source: e,
            })?;
        let result = ExecuteResult {
            changes,
            last_insert_id: self.conn.last_insert_rowid(),
        };

        if !self.in_transaction.get() {
            self.save()?;
        }

        Ok(result)
    }

    /// Run `body` inside an explicit transaction with exactly one flush
    ///
    /// Fails fast with [`StoreError::NestedTransaction`] when called while a
    /// transaction is already open. If `body` fails, the transaction is
    /// rolled back; a rollback failure is surfaced as
    /// [`StoreError::RollbackFailed`] carrying both errors. The transaction
    /// flag is cleared on every path.
    pub fn transaction<T, F>(&self, body: F) -> StoreResult<T>
    where
        F: FnOnce(&Self) -> StoreResult<T>,
    {
        self.ensure_initialized()?;

        if self.in_transaction.get() {
            return Err(StoreError::NestedTransaction);
        }

        self.conn
            .execute_batch("BEGIN")
            .map_err(|e| StoreError::Execute {
                statement: "BEGIN".to_string(),
                source: e,
            })?;
        self.in_transaction.set(true);

        match body(self) {
            Ok(value) => {
                let committed = self.conn.execute_batch("COMMIT");
                self.in_transaction.set(false);
                committed.map_err(|e| StoreError::Execute {
                    statement: "COMMIT".to_string(),
                    source: e,
                })?;
                self.save()?;
                Ok(value)
            }
            Err(original) => {
                let rolled_back = self.conn.execute_batch("ROLLBACK");
                self.in_transaction.set(false);
                match rolled_back {
                    Ok(()) => Err(original),
                    Err(rollback) => Err(StoreError::RollbackFailed {
                        original: Box::new(original),
                        rollback,
                    }),
                }
            }
        }
    }

    /// Serialize the full in-memory image to the durable file
    ///
    /// Writes to a temp file, syncs, then renames over the target so the
    /// file is never left partially written. The in-memory image is
    /// unaffected by a save failure.
    pub fn save(&self) -> StoreResult<()> {
        self.ensure_initialized()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.save_error(e))?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        self.conn
            .backup(DatabaseName::Main, &temp_path, None)
            .map_err(|e| self.save_error(e))?;

        let file = fs::File::open(&temp_path).map_err(|e| self.save_error(e))?;
        file.sync_all().map_err(|e| self.save_error(e))?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|e| self.save_error(e))?;
        Ok(())
    }

    fn save_error(&self, source: impl std::error::Error + Send + Sync + 'static) -> StoreError {
        StoreError::Save {
            path: self.path.clone(),
            source: Box::new(source),
        }
    }

    /// Save, then release the in-memory image
    pub fn close(self) -> StoreResult<()> {
        self.save()?;
        self.initialized.set(false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use tempfile::TempDir;

    fn store_path(temp_dir: &TempDir) -> PathBuf {
        temp_dir.path().join("coursebox.db")
    }

    fn insert_courseware(store: &Store, id: &str, title: &str) -> ExecuteResult {
        store
            .execute(
                "INSERT INTO coursewares (id, title, status, created_at, updated_at)
                 VALUES (?1, ?2, 'draft', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
                params![id, title],
            )
            .unwrap()
    }

    fn courseware_count(store: &Store) -> i64 {
        store
            .query_row("SELECT COUNT(*) FROM coursewares", [], |row| row.get(0))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_open_creates_empty_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(store_path(&temp_dir)).unwrap();

        assert!(store.is_initialized());
        assert_eq!(courseware_count(&store), 0);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = Store::open(store_path(&temp_dir)).unwrap();

        insert_courseware(&store, "c1", "Algebra");
        store.initialize().unwrap();

        // Second initialize does not reload or wipe the image
        assert_eq!(courseware_count(&store), 1);
    }

    #[test]
    fn test_execute_flushes_to_disk() {
        let temp_dir = TempDir::new().unwrap();
        let path = store_path(&temp_dir);

        {
            let store = Store::open(&path).unwrap();
            let result = insert_courseware(&store, "c1", "Algebra");
            assert_eq!(result.changes, 1);
        }

        // A fresh store loads the flushed image
        let reopened = Store::open(&path).unwrap();
        assert_eq!(courseware_count(&reopened), 1);
    }

    #[test]
    fn test_save_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = store_path(&temp_dir);

        let store = Store::open(&path).unwrap();
        insert_courseware(&store, "c1", "Algebra");
        insert_courseware(&store, "c2", "Geometry");
        store.save().unwrap();

        let reopened = Store::open(&path).unwrap();
        let titles: Vec<String> = reopened
            .query(
                "SELECT title FROM coursewares ORDER BY id",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(titles, vec!["Algebra".to_string(), "Geometry".to_string()]);
    }

    #[test]
    fn test_query_error_on_malformed_statement() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(store_path(&temp_dir)).unwrap();

        let err = store
            .query("SELECT FROM nowhere", [], |row| row.get::<_, String>(0))
            .unwrap_err();
        assert!(matches!(err, StoreError::Query { .. }));
    }

    #[test]
    fn test_execute_error_on_parameter_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(store_path(&temp_dir)).unwrap();

        let err = store
            .execute(
                "INSERT INTO coursewares (id, title, status, created_at, updated_at)
                 VALUES (?1, ?2, 'draft', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
                params!["c1"],
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Execute { .. }));
    }

    #[test]
    fn test_transaction_commits_with_single_flush() {
        let temp_dir = TempDir::new().unwrap();
        let path = store_path(&temp_dir);
        let store = Store::open(&path).unwrap();

        // Establish a baseline image on disk
        insert_courseware(&store, "c0", "Baseline");

        store
            .transaction(|s| {
                insert_courseware(s, "c1", "Algebra");
                insert_courseware(s, "c2", "Geometry");

                // Nothing is flushed mid-transaction: a second store opened
                // from the same path only sees the baseline
                let observer = Store::open(&path).unwrap();
                assert_eq!(courseware_count(&observer), 1);
                Ok(())
            })
            .unwrap();

        let reopened = Store::open(&path).unwrap();
        assert_eq!(courseware_count(&reopened), 3);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(store_path(&temp_dir)).unwrap();

        let result: StoreResult<()> = store.transaction(|s| {
            insert_courseware(s, "c1", "Algebra");
            // Malformed statement fails the body
            s.execute("INSERT INTO nowhere VALUES (1)", [])?;
            Ok(())
        });

        assert!(matches!(result, Err(StoreError::Execute { .. })));
        assert_eq!(courseware_count(&store), 0);
        // The flag is cleared; the store is usable again
        insert_courseware(&store, "c2", "Geometry");
        assert_eq!(courseware_count(&store), 1);
    }

    #[test]
    fn test_nested_transaction_fails_fast() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(store_path(&temp_dir)).unwrap();

        let result: StoreResult<()> =
            store.transaction(|s| s.transaction(|_| Ok(())));
        assert!(matches!(result, Err(StoreError::NestedTransaction)));

        // Outer rollback left the store usable
        insert_courseware(&store, "c1", "Algebra");
        assert_eq!(courseware_count(&store), 1);
    }

    #[test]
    fn test_close_saves() {
        let temp_dir = TempDir::new().unwrap();
        let path = store_path(&temp_dir);

        let store = Store::open(&path).unwrap();
        store
            .transaction(|s| {
                insert_courseware(s, "c1", "Algebra");
                Ok(())
            })
            .unwrap();
        store.close().unwrap();

        let reopened = Store::open(&path).unwrap();
        assert_eq!(courseware_count(&reopened), 1);
    }

    #[test]
    fn test_save_failure_is_save_error() {
        let temp_dir = TempDir::new().unwrap();
        // A regular file where the parent directory should go makes
        // create_dir_all fail
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        // Open succeeds: nothing is flushed until the first write
        let store = Store::open(blocker.join("coursebox.db")).unwrap();
        let err = store.save().unwrap_err();
        assert!(matches!(err, StoreError::Save { .. }));
        assert!(err.to_string().contains("coursebox.db"));
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b").join("coursebox.db");

        let store = Store::open(&nested).unwrap();
        store.save().unwrap();
        assert!(nested.exists());
    }
}
