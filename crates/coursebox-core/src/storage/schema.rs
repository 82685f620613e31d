//! SQLite schema for the courseware store
//!
//! Migrations are additive-only: new tables and columns may be added,
//! existing ones are never dropped or rewritten. Timestamps are stored as
//! RFC 3339 text.

use rusqlite::{Connection, Result};

/// Current schema version for migrations
///
/// v1: coursewares, questions, change_log
/// v2: adds coursewares.thumbnail and questions.ocr_text
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Coursewares table
        CREATE TABLE IF NOT EXISTS coursewares (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            thumbnail TEXT,
            status TEXT NOT NULL DEFAULT 'draft',
            settings TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- Questions table; deleting a courseware cascades here
        CREATE TABLE IF NOT EXISTS questions (
            id TEXT PRIMARY KEY,
            courseware_id TEXT NOT NULL,
            order_index INTEGER NOT NULL,
            question_type TEXT NOT NULL,
            media_paths TEXT,
            ocr_text TEXT,
            options TEXT,
            answer TEXT,
            annotation TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (courseware_id) REFERENCES coursewares(id) ON DELETE CASCADE
        );

        -- Outbox: local mutations awaiting propagation
        CREATE TABLE IF NOT EXISTS change_log (
            id TEXT PRIMARY KEY,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            action TEXT NOT NULL,
            sync_status TEXT NOT NULL DEFAULT 'pending',
            local_updated_at TEXT NOT NULL,
            remote_updated_at TEXT,
            error_message TEXT,
            created_at TEXT NOT NULL
        );

        -- Indexes for common query patterns
        CREATE INDEX IF NOT EXISTS idx_questions_courseware
            ON questions(courseware_id, order_index);
        CREATE INDEX IF NOT EXISTS idx_coursewares_updated_at
            ON coursewares(updated_at);
        CREATE INDEX IF NOT EXISTS idx_change_log_status
            ON change_log(sync_status, created_at);
        CREATE INDEX IF NOT EXISTS idx_change_log_entity
            ON change_log(entity_type, entity_id);
        "#,
    )?;

    // Additive migrations for images created before v2
    ensure_column(conn, "coursewares", "thumbnail", "TEXT")?;
    ensure_column(conn, "questions", "ocr_text", "TEXT")?;

    // Set schema version
    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Add a column if the table does not already have it
///
/// Returns true when the column was added.
pub fn ensure_column(conn: &Connection, table: &str, column: &str, decl: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(|r| r.ok())
        .any(|name| name == column);

    if exists {
        return Ok(false);
    }

    conn.execute_batch(&format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        table, column, decl
    ))?;
    Ok(true)
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}
