//! Question repository
//!
//! Questions live inside a courseware and carry an order_index for their
//! position. Batch replace and reorder run inside a single store
//! transaction so the image is flushed once.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::ToSql, Row};
use serde_json::Value;

use crate::models::{new_entity_id, Question};
use crate::storage::StoreResult;
use crate::store::Store;

const COLUMNS: &str = "id, courseware_id, order_index, question_type, media_paths, ocr_text, \
                       options, answer, annotation, created_at, updated_at";

/// Input for creating a question
#[derive(Debug, Clone)]
pub struct NewQuestion {
    /// Explicit id; a fresh one is generated when absent
    pub id: Option<String>,
    pub courseware_id: String,
    /// Explicit position; appended after the current last question when absent
    pub order_index: Option<i64>,
    pub question_type: String,
    pub media_paths: Vec<String>,
    pub ocr_text: Option<String>,
    pub options: Value,
    pub answer: Value,
    pub annotation: Value,
}

impl NewQuestion {
    pub fn new(courseware_id: impl Into<String>, question_type: impl Into<String>) -> Self {
        Self {
            id: None,
            courseware_id: courseware_id.into(),
            order_index: None,
            question_type: question_type.into(),
            media_paths: Vec::new(),
            ocr_text: None,
            options: Value::Null,
            answer: Value::Null,
            annotation: Value::Null,
        }
    }
}

/// Partial update; absent fields are left untouched
///
/// `Some(None)` on ocr_text clears it. A question cannot be moved to
/// another courseware.
#[derive(Debug, Clone, Default)]
pub struct QuestionPatch {
    pub order_index: Option<i64>,
    pub question_type: Option<String>,
    pub media_paths: Option<Vec<String>>,
    pub ocr_text: Option<Option<String>>,
    pub options: Option<Value>,
    pub answer: Option<Value>,
    pub annotation: Option<Value>,
}

impl QuestionPatch {
    pub fn is_empty(&self) -> bool {
        self.order_index.is_none()
            && self.question_type.is_none()
            && self.media_paths.is_none()
            && self.ocr_text.is_none()
            && self.options.is_none()
            && self.answer.is_none()
            && self.annotation.is_none()
    }
}

/// Result of replacing a courseware's question set
#[derive(Debug, Clone)]
pub struct BatchReplace {
    /// Ids of the questions removed by the replace; callers record deletion
    /// intents for these
    pub removed_ids: Vec<String>,
    /// The new question set, in order
    pub questions: Vec<Question>,
}

/// CRUD for questions
pub struct QuestionRepo<'a> {
    store: &'a Store,
}

impl<'a> QuestionRepo<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Insert a new question
    ///
    /// Without an explicit order_index the question is appended after the
    /// current last one (0 for an empty courseware).
    pub fn create(&self, input: NewQuestion) -> StoreResult<Question> {
        let order_index = match input.order_index {
            Some(index) => index,
            None => self.next_order_index(&input.courseware_id)?,
        };
        insert_question(self.store, input, order_index, Utc::now())
    }

    /// Get a question by id
    pub fn get(&self, id: &str) -> StoreResult<Option<Question>> {
        self.store.query_row(
            &format!("SELECT {} FROM questions WHERE id = ?1", COLUMNS),
            params![id],
            row_to_question,
        )
    }

    /// All questions of a courseware, in position order
    pub fn list_for_courseware(&self, courseware_id: &str) -> StoreResult<Vec<Question>> {
        self.store.query(
            &format!(
                "SELECT {} FROM questions WHERE courseware_id = ?1 ORDER BY order_index",
                COLUMNS
            ),
            params![courseware_id],
            row_to_question,
        )
    }

    /// Apply a partial update, refreshing updated_at
    ///
    /// An empty patch returns the current row unchanged. Returns None when
    /// the question does not exist.
    pub fn update(&self, id: &str, patch: QuestionPatch) -> StoreResult<Option<Question>> {
        let Some(current) = self.get(id)? else {
            return Ok(None);
        };
        if patch.is_empty() {
            return Ok(Some(current));
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(order_index) = patch.order_index {
            sets.push("order_index = ?");
            values.push(Box::new(order_index));
        }
        if let Some(question_type) = patch.question_type {
            sets.push("question_type = ?");
            values.push(Box::new(question_type));
        }
        if let Some(media_paths) = patch.media_paths {
            sets.push("media_paths = ?");
            values.push(Box::new(encode_paths(&media_paths)));
        }
        if let Some(ocr_text) = patch.ocr_text {
            sets.push("ocr_text = ?");
            values.push(Box::new(ocr_text));
        }
        if let Some(options) = patch.options {
            sets.push("options = ?");
            values.push(Box::new(encode_blob(&options)));
        }
        if let Some(answer) = patch.answer {
            sets.push("answer = ?");
            values.push(Box::new(encode_blob(&answer)));
        }
        if let Some(annotation) = patch.annotation {
            sets.push("annotation = ?");
            values.push(Box::new(encode_blob(&annotation)));
        }

        sets.push("updated_at = ?");
        values.push(Box::new(Utc::now()));
        values.push(Box::new(id.to_string()));

        let sql = format!("UPDATE questions SET {} WHERE id = ?", sets.join(", "));
        self.store
            .execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))?;

        self.get(id)
    }

    /// Replace the entire question set of a courseware in one transaction
    ///
    /// Positions become the order_index unless an item carries an explicit
    /// one. The previous questions are removed and their ids reported so the
    /// caller can record deletion intents.
    pub fn replace_for_courseware(
        &self,
        courseware_id: &str,
        items: Vec<NewQuestion>,
    ) -> StoreResult<BatchReplace> {
        self.store.transaction(|store| {
            let removed_ids: Vec<String> = store.query(
                "SELECT id FROM questions WHERE courseware_id = ?1 ORDER BY order_index",
                params![courseware_id],
                |row| row.get(0),
            )?;

            store.execute(
                "DELETE FROM questions WHERE courseware_id = ?1",
                params![courseware_id],
            )?;

            let now = Utc::now();
            let mut questions = Vec::with_capacity(items.len());
            for (position, mut item) in items.into_iter().enumerate() {
                item.courseware_id = courseware_id.to_string();
                let order_index = item.order_index.unwrap_or(position as i64);
                questions.push(insert_question(store, item, order_index, now)?);
            }

            Ok(BatchReplace {
                removed_ids,
                questions,
            })
        })
    }

    /// Reassign order_index by position in the given id sequence
    ///
    /// Runs in one transaction; updated_at is refreshed on every moved row.
    /// Ids not belonging to the courseware are ignored. Returns the new
    /// ordering.
    pub fn reorder(&self, courseware_id: &str, ids: &[String]) -> StoreResult<Vec<Question>> {
        self.store.transaction(|store| {
            let now = Utc::now();
            for (position, id) in ids.iter().enumerate() {
                store.execute(
                    "UPDATE questions SET order_index = ?1, updated_at = ?2
                     WHERE id = ?3 AND courseware_id = ?4",
                    params![position as i64, now, id, courseware_id],
                )?;
            }
            Ok(())
        })?;

        self.list_for_courseware(courseware_id)
    }

    /// Hard delete; returns false when the question did not exist
    pub fn delete(&self, id: &str) -> StoreResult<bool> {
        let result = self
            .store
            .execute("DELETE FROM questions WHERE id = ?1", params![id])?;
        Ok(result.changes > 0)
    }

    pub fn count(&self) -> StoreResult<i64> {
        Ok(self
            .store
            .query_row("SELECT COUNT(*) FROM questions", [], |row| row.get(0))?
            .unwrap_or(0))
    }

    fn next_order_index(&self, courseware_id: &str) -> StoreResult<i64> {
        let max: Option<i64> = self
            .store
            .query_row(
                "SELECT MAX(order_index) FROM questions WHERE courseware_id = ?1",
                params![courseware_id],
                |row| row.get(0),
            )?
            .flatten();
        Ok(max.map_or(0, |m| m + 1))
    }
}

fn insert_question(
    store: &Store,
    input: NewQuestion,
    order_index: i64,
    now: DateTime<Utc>,
) -> StoreResult<Question> {
    let id = input.id.unwrap_or_else(new_entity_id);

    store.execute(
        "INSERT INTO questions (id, courseware_id, order_index, question_type, media_paths,
                                ocr_text, options, answer, annotation, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            id,
            input.courseware_id,
            order_index,
            input.question_type,
            encode_paths(&input.media_paths),
            input.ocr_text,
            encode_blob(&input.options),
            encode_blob(&input.answer),
            encode_blob(&input.annotation),
            now,
            now,
        ],
    )?;

    Ok(Question {
        id,
        courseware_id: input.courseware_id,
        order_index,
        question_type: input.question_type,
        media_paths: input.media_paths,
        ocr_text: input.ocr_text,
        options: input.options,
        answer: input.answer,
        annotation: input.annotation,
        created_at: now,
        updated_at: now,
    })
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

fn encode_paths(paths: &[String]) -> Option<String> {
    if paths.is_empty() {
        None
    } else {
        serde_json::to_string(paths).ok()
    }
}

fn decode_paths(text: Option<String>) -> Vec<String> {
    text.as_deref()
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

fn row_to_question(row: &Row<'_>) -> rusqlite::Result<Question> {
    let media_paths: Option<String> = row.get(4)?;
    let options: Option<String> = row.get(6)?;
    let answer: Option<String> = row.get(7)?;
    let annotation: Option<String> = row.get(8)?;
    Ok(Question {
        id: row.get(0)?,
        courseware_id: row.get(1)?,
        order_index: row.get(2)?,
        question_type: row.get(3)?,
        media_paths: decode_paths(media_paths),
        ocr_text: row.get(5)?,
        options: decode_blob(options),
        answer: decode_blob(answer),
        annotation: decode_blob(annotation),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
