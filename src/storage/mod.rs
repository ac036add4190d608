//! Storage Layer - SQLite-backed persistence
//!
//! Durable mirror of both in-memory indices, one database per workspace root:
//! - source_files(path, content_hash, last_modified, imports, exports, symbols, depends_on, depended_by)
//! - modules(name, version, manifest_path, last_modified)
//! - components(module_name, name, file_path, is_builtin, is_singleton, version)
//!
//! Rows are validated against a fresh file stat when loaded at startup; stale rows
//! are deleted instead of returned.

pub mod schema;
pub mod sqlite;

pub use sqlite::{SqliteStore, SharedStore, DbStats};
