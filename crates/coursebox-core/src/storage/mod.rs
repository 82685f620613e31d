//! Storage layer
//!
//! Error taxonomy and SQLite schema for the persistent store.
//!
//! The store keeps the whole relational image in memory and snapshots it to
//! a single on-disk file; see [`crate::store::Store`].

pub mod error;
pub mod schema;

pub use error::{StoreError, StoreResult};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
