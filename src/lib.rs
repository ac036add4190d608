//! # qmlscope - Incremental QML Workspace Index
//!
//! Keeps a live, queryable index of a QML source tree in sync with the file system.
//!
//! qmlscope provides:
//! - Per-document metadata (imports, exports, symbols) keyed by absolute path
//! - A module registry built from `qmldir` manifests plus a builtin Qt catalog
//! - Forward/reverse file dependency edges with cascading invalidation
//! - SQLite-backed persistence validated against file timestamps on startup
//! - File watchers that drive incremental re-indexing

pub mod uri;
pub mod symbol;
pub mod locks;
pub mod graph;
pub mod source;
pub mod module;
pub mod storage;
pub mod watcher;
pub mod ignore;
pub mod config;
pub mod index;

// Re-exports for convenient access
pub use uri::FileUri;
pub use symbol::{Symbol, SymbolKind, TextRange, Position};
pub use source::{DocumentParser, QmlParser, SourceFileEntry, SourceFileIndexer, Import, ImportKind, Exports};
pub use module::{ModuleIndexer, ModuleRegistryEntry, ComponentRecord};
pub use storage::SqliteStore;
pub use config::IndexConfig;
pub use index::WorkspaceIndex;

/// Result type alias for qmlscope operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for qmlscope operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task failed: {0}")]
    Task(String),
}
