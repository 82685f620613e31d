//! Coursebox Core Library
//!
//! This crate provides the core functionality for Coursebox, a single-user,
//! offline-first courseware authoring tool.
//!
//! # Architecture
//!
//! - **Store**: an in-memory SQLite image snapshotted to a single file on
//!   every write (whole-image flush, explicit transactions)
//! - **Repositories**: CRUD over coursewares and their questions
//! - **Change log**: an outbox tracking the latest outstanding intent per
//!   entity
//! - **Sync engine**: pushes pending changes to a remote endpoint and pulls
//!   remote changes back, with last-write-wins conflict detection
//!
//! # Quick Start
//!
//! ```text
//! let store = Store::open(config.store_path())?;
//!
//! // Create a courseware and track it for sync
//! let repo = CoursewareRepo::new(&store);
//! let courseware = repo.create(NewCourseware::new("Algebra Basics"))?;
//! ChangeLog::new(&store).record(
//!     EntityType::Courseware, &courseware.id, ChangeAction::Create)?;
//! ```
//!
//! # Modules
//!
//! - `store`: the persistent store (main entry point)
//! - `repo`: courseware and question repositories
//! - `changelog`: the change log / outbox
//! - `sync`: sync engine, remote endpoint, sync config
//! - `models`: data structures
//! - `storage`: schema and store errors
//! - `config`: application configuration

pub mod changelog;
pub mod config;
pub mod models;
pub mod repo;
pub mod storage;
pub mod store;
pub mod sync;

pub use changelog::{ChangeLog, ChangeLogStats};
pub use config::Config;
pub use models::{
    ChangeAction, ChangeLogRecord, Courseware, CoursewareStatus, EntityType, Question, SyncResult,
    SyncStatus,
};
pub use repo::{
    BatchReplace, CoursewarePatch, CoursewareRepo, NewCourseware, NewQuestion, QuestionPatch,
    QuestionRepo,
};
pub use storage::{StoreError, StoreResult};
pub use store::Store;
pub use sync::{
    HttpRemote, RemoteEndpoint, SyncConfig, SyncConfigUpdate, SyncDirection, SyncEngine,
};
