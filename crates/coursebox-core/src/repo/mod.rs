//! Entity repositories
//!
//! Thin CRUD over the store for the two entity kinds. Repositories own no
//! state of their own; callers that want a mutation tracked for sync must
//! record it in the change log themselves.

pub mod courseware;
pub mod question;

pub use courseware::{CoursewarePatch, CoursewareRepo, NewCourseware};
pub use question::{BatchReplace, NewQuestion, QuestionPatch, QuestionRepo};
