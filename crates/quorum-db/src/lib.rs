//! Quorum data layer.
//!
//! A collection-oriented store over embedded SQLite: records are JSON
//! documents validated against a schema that is itself built up by an ordered
//! list of reversible migration steps. Also hosts the filter language used by
//! list queries and the token-based auth store.

pub mod auth;
pub mod database;
pub mod filter;
pub mod migrations;
pub mod records;
pub mod schema;

pub use database::{Database, DatabaseStats};
pub use records::{ListOptions, Record, RecordPage, RecordStore};
