//! Data models for Coursebox
//!
//! Defines the core data structures: Courseware, Question, and the
//! change-log record used by the sync engine. Blob-like fields (settings,
//! options, answer, annotation) are opaque JSON values; the store never
//! interprets them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle status of a courseware
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoursewareStatus {
    #[default]
    Draft,
    Completed,
    Archived,
}

impl CoursewareStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            "archived" => Self::Archived,
            _ => Self::Draft,
        }
    }
}

/// Kind of entity a change-log record refers to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Courseware,
    Question,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Courseware => "courseware",
            Self::Question => "question",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "question" => Self::Question,
            _ => Self::Courseware,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutation kind tracked by the change log
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "create" => Self::Create,
            "delete" => Self::Delete,
            _ => Self::Update,
        }
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sync state of a change-log record
///
/// pending = not yet sent, synced = acknowledged remote, failed = last
/// attempt errored. synced and failed are terminal until retried or purged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Pending,
    Synced,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "synced" => Self::Synced,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A courseware: a titled sequence of exam questions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Courseware {
    /// Unique identifier (opaque string)
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// Path to a thumbnail image, if any
    pub thumbnail: Option<String>,
    pub status: CoursewareStatus,
    /// Opaque settings blob
    pub settings: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single exam question belonging to a courseware
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: String,
    /// Owning courseware
    pub courseware_id: String,
    /// Position within the courseware; unique per courseware, dense but not
    /// required contiguous
    pub order_index: i64,
    /// Type tag, e.g. "single_choice" or "essay"
    pub question_type: String,
    /// Paths to attached media files
    pub media_paths: Vec<String>,
    /// Text extracted from media by OCR, if any
    pub ocr_text: Option<String>,
    /// Opaque options blob
    pub options: Value,
    /// Opaque answer blob
    pub answer: Value,
    /// Opaque annotation blob
    pub annotation: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An outbox entry: one local mutation awaiting propagation to the remote
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeLogRecord {
    pub id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub action: ChangeAction,
    pub sync_status: SyncStatus,
    /// When the tracked mutation last happened locally
    pub local_updated_at: DateTime<Utc>,
    /// Set when the record transitions to synced
    pub remote_updated_at: Option<DateTime<Utc>>,
    /// Set when the record transitions to failed
    pub error_message: Option<String>,
    /// When the outstanding intent was first created (FIFO key)
    pub created_at: DateTime<Utc>,
}

/// Outcome of one sync invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    pub uploaded: u32,
    pub downloaded: u32,
    pub conflicts: u32,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl SyncResult {
    pub fn new() -> Self {
        Self {
            success: true,
            uploaded: 0,
            downloaded: 0,
            conflicts: 0,
            errors: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    /// A result that failed before any record was touched
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            uploaded: 0,
            downloaded: 0,
            conflicts: 0,
            errors: vec![message.into()],
            completed_at: Utc::now(),
        }
    }
}

impl Default for SyncResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a fresh opaque entity id
pub fn new_entity_id() -> String {
    Uuid::new_v4().to_string()
}
