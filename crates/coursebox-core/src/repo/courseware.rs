//! Courseware repository

use chrono::Utc;
use rusqlite::{params, params_from_iter, types::ToSql, Row};
use serde_json::Value;

use crate::models::{new_entity_id, Courseware, CoursewareStatus};
use crate::storage::StoreResult;
use crate::store::Store;

const COLUMNS: &str = "id, title, description, thumbnail, status, settings, created_at, updated_at";

/// Input for creating a courseware
#[derive(Debug, Clone)]
pub struct NewCourseware {
    /// Explicit id; a fresh one is generated when absent
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub status: CoursewareStatus,
    pub settings: Value,
}

impl NewCourseware {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: None,
            thumbnail: None,
            status: CoursewareStatus::Draft,
            settings: Value::Null,
        }
    }
}

/// Partial update; absent fields are left untouched
///
/// `Some(None)` on a nullable field clears it.
#[derive(Debug, Clone, Default)]
pub struct CoursewarePatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub thumbnail: Option<Option<String>>,
    pub status: Option<CoursewareStatus>,
    pub settings: Option<Value>,
}

impl CoursewarePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.thumbnail.is_none()
            && self.status.is_none()
            && self.settings.is_none()
    }
}

/// CRUD for coursewares
pub struct CoursewareRepo<'a> {
    store: &'a Store,
}

impl<'a> CoursewareRepo<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Insert a new courseware, assigning id and timestamps
    pub fn create(&self, input: NewCourseware) -> StoreResult<Courseware> {
        let id = input.id.unwrap_or_else(new_entity_id);
        let now = Utc::now();
        let settings = encode_blob(&input.settings);

        self.store.execute(
            "INSERT INTO coursewares (id, title, description, thumbnail, status, settings, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                input.title,
                input.description,
                input.thumbnail,
                input.status.as_str(),
                settings,
                now,
                now,
            ],
        )?;

        Ok(Courseware {
            id,
            title: input.title,
            description: input.description,
            thumbnail: input.thumbnail,
            status: input.status,
            settings: input.settings,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a courseware by id
    pub fn get(&self, id: &str) -> StoreResult<Option<Courseware>> {
        self.store.query_row(
            &format!("SELECT {} FROM coursewares WHERE id = ?1", COLUMNS),
            params![id],
            row_to_courseware,
        )
    }

    /// All coursewares, most recently updated first
    pub fn list(&self) -> StoreResult<Vec<Courseware>> {
        self.store.query(
            &format!(
                "SELECT {} FROM coursewares ORDER BY updated_at DESC",
                COLUMNS
            ),
            [],
            row_to_courseware,
        )
    }

    /// Apply a partial update, refreshing updated_at
    ///
    /// An empty patch returns the current row unchanged. Returns None when
    /// the courseware does not exist.
    pub fn update(&self, id: &str, patch: CoursewarePatch) -> StoreResult<Option<Courseware>> {
        let Some(current) = self.get(id)? else {
            return Ok(None);
        };
        if patch.is_empty() {
            return Ok(Some(current));
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(title) = patch.title {
            sets.push("title = ?");
            values.push(Box::new(title));
        }
        if let Some(description) = patch.description {
            sets.push("description = ?");
            values.push(Box::new(description));
        }
        if let Some(thumbnail) = patch.thumbnail {
            sets.push("thumbnail = ?");
            values.push(Box::new(thumbnail));
        }
        if let Some(status) = patch.status {
            sets.push("status = ?");
            values.push(Box::new(status.as_str()));
        }
        if let Some(settings) = patch.settings {
            sets.push("settings = ?");
            values.push(Box::new(encode_blob(&settings)));
        }

        sets.push("updated_at = ?");
        values.push(Box::new(Utc::now()));
        values.push(Box::new(id.to_string()));

        let sql = format!("UPDATE coursewares SET {} WHERE id = ?", sets.join(", "));
        self.store
            .execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))?;

        self.get(id)
    }

    /// Hard delete; questions cascade
    ///
    /// Returns the ids of the cascaded questions so the caller can record
    /// deletion intents for them, or None when the courseware did not exist.
    pub fn delete(&self, id: &str) -> StoreResult<Option<Vec<String>>> {
        let question_ids: Vec<String> = self.store.query(
            "SELECT id FROM questions WHERE courseware_id = ?1 ORDER BY order_index",
            params![id],
            |row| row.get(0),
        )?;

        let result = self
            .store
            .execute("DELETE FROM coursewares WHERE id = ?1", params![id])?;

        if result.changes == 0 {
            Ok(None)
        } else {
            Ok(Some(question_ids))
        }
    }

    pub fn count(&self) -> StoreResult<i64> {
        Ok(self
            .store
            .query_row("SELECT COUNT(*) FROM coursewares", [], |row| row.get(0))?
            .unwrap_or(0))
    }
}

fn encode_blob(value: &Value) -> Option<String> {
    if value.is_null() {
        None
    } else {
        Some(value.to_string())
    }
}

fn decode_blob(text: Option<String>) -> Value {
    text.as_deref()
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or(Value::Null)
}

fn row_to_courseware(row: &Row<'_>) -> rusqlite::Result<Courseware> {
    let status: String = row.get(4)?;
    let settings: Option<String> = row.get(5)?;
    Ok(Courseware {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        thumbnail: row.get(3)?,
        status: CoursewareStatus::from_str(&status),
        settings: decode_blob(settings),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(temp_dir: &TempDir) -> Store {
        Store::open(temp_dir.path().join("coursebox.db")).unwrap()
    }

    #[test]
    fn test_create_assigns_id_and_timestamps() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let repo = CoursewareRepo::new(&store);

        let courseware = repo.create(NewCourseware::new("Algebra Basics")).unwrap();
        assert!(!courseware.id.is_empty());
        assert_eq!(courseware.title, "Algebra Basics");
        assert_eq!(courseware.status, CoursewareStatus::Draft);
        assert_eq!(courseware.created_at, courseware.updated_at);
    }

    #[test]
    fn test_create_with_explicit_id() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let repo = CoursewareRepo::new(&store);

        let mut input = NewCourseware::new("Geometry");
        input.id = Some("cw-1".to_string());
        let courseware = repo.create(input).unwrap();
        assert_eq!(courseware.id, "cw-1");
    }

    #[test]
    fn test_settings_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let repo = CoursewareRepo::new(&store);

        let mut input = NewCourseware::new("Algebra");
        input.settings = serde_json::json!({"shuffle": true, "time_limit": 90});
        let courseware = repo.create(input).unwrap();

        let fetched = repo.get(&courseware.id).unwrap().unwrap();
        assert_eq!(fetched.settings["shuffle"], serde_json::json!(true));
        assert_eq!(fetched.settings["time_limit"], serde_json::json!(90));
    }

    #[test]
    fn test_update_partial() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let repo = CoursewareRepo::new(&store);

        let courseware = repo.create(NewCourseware::new("Algebra")).unwrap();

        let patch = CoursewarePatch {
            title: Some("Algebra II".to_string()),
            status: Some(CoursewareStatus::Completed),
            ..Default::default()
        };
        let updated = repo.update(&courseware.id, patch).unwrap().unwrap();

        assert_eq!(updated.title, "Algebra II");
        assert_eq!(updated.status, CoursewareStatus::Completed);
        assert!(updated.updated_at >= courseware.updated_at);
        // Untouched fields survive
        assert_eq!(updated.description, None);
    }

    #[test]
    fn test_update_clears_nullable_field() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let repo = CoursewareRepo::new(&store);

        let mut input = NewCourseware::new("Algebra");
        input.description = Some("intro course".to_string());
        let courseware = repo.create(input).unwrap();

        let patch = CoursewarePatch {
            description: Some(None),
            ..Default::default()
        };
        let updated = repo.update(&courseware.id, patch).unwrap().unwrap();
        assert_eq!(updated.description, None);
    }

    #[test]
    fn test_empty_patch_is_a_no_op() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let repo = CoursewareRepo::new(&store);

        let courseware = repo.create(NewCourseware::new("Algebra")).unwrap();
        let unchanged = repo
            .update(&courseware.id, CoursewarePatch::default())
            .unwrap()
            .unwrap();

        assert_eq!(unchanged, courseware);
    }

    #[test]
    fn test_update_missing_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let repo = CoursewareRepo::new(&store);

        let result = repo
            .update(
                "missing",
                CoursewarePatch {
                    title: Some("x".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_delete_cascades_and_reports_question_ids() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let repo = CoursewareRepo::new(&store);
        let questions = crate::repo::QuestionRepo::new(&store);

        let courseware = repo.create(NewCourseware::new("Algebra")).unwrap();
        let q1 = questions
            .create(crate::repo::NewQuestion::new(&courseware.id, "single_choice"))
            .unwrap();
        let q2 = questions
            .create(crate::repo::NewQuestion::new(&courseware.id, "essay"))
            .unwrap();

        let removed = repo.delete(&courseware.id).unwrap().unwrap();
        assert_eq!(removed, vec![q1.id.clone(), q2.id.clone()]);

        assert!(repo.get(&courseware.id).unwrap().is_none());
        assert!(questions.get(&q1.id).unwrap().is_none());
        assert!(questions.get(&q2.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_missing_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let repo = CoursewareRepo::new(&store);

        assert!(repo.delete("missing").unwrap().is_none());
    }

    #[test]
    fn test_list_orders_by_updated_at() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let repo = CoursewareRepo::new(&store);

        let a = repo.create(NewCourseware::new("First")).unwrap();
        let b = repo.create(NewCourseware::new("Second")).unwrap();

        // Touch the older one so it sorts first
        repo.update(
            &a.id,
            CoursewarePatch {
                title: Some("First (edited)".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let all = repo.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, a.id);
        assert_eq!(all[1].id, b.id);
    }
}
