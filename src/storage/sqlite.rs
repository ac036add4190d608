//! SQLite storage implementation

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};
use crate::module::{ComponentRecord, ModuleRegistryEntry};
use crate::source::SourceFileEntry;
use crate::uri::{stat_millis, FileUri};
use crate::{Error, Result};
use super::schema;

/// Store handle shared by both indexers and the facade.
///
/// Callers that also hold an index map lock must take the map lock first.
pub type SharedStore = Arc<Mutex<SqliteStore>>;

const SOURCE_FILE_COLUMNS: &str =
    "path, content_hash, last_modified, imports, exports, symbols, depends_on, depended_by";

/// SQLite-backed mirror of the source-file and module indices
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        debug!(path = %path.display(), "opened index database");
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Wrap the store for sharing between indexers
    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== Source File Operations ==========

    /// Insert or replace a batch of entries in one transaction.
    ///
    /// Any failing row rolls back the whole batch.
    pub fn save_source_files(&mut self, entries: &[SourceFileEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let result = self.write_source_files(entries);
        if let Err(e) = &result {
            error!(count = entries.len(), "source file batch rolled back: {}", e);
        }
        result
    }

    fn write_source_files(&mut self, entries: &[SourceFileEntry]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO source_files ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                SOURCE_FILE_COLUMNS
            ))?;
            for entry in entries {
                stmt.execute(params![
                    entry.uri.path_string(),
                    entry.content_hash,
                    entry.last_modified,
                    to_json(&entry.imports)?,
                    to_json(&entry.exports)?,
                    to_json(&entry.symbols)?,
                    to_json(&entry.depends_on)?,
                    to_json(&entry.depended_by)?,
                ])?;
            }
        }
        tx.commit()?;
        Ok(entries.len())
    }

    /// Insert or replace a single entry
    pub fn save_source_file(&mut self, entry: &SourceFileEntry) -> Result<()> {
        self.save_source_files(std::slice::from_ref(entry))?;
        Ok(())
    }

    /// Get a persisted entry by URI (no validation)
    pub fn get_source_file(&self, uri: &FileUri) -> Result<Option<SourceFileEntry>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM source_files WHERE path = ?1", SOURCE_FILE_COLUMNS),
                [uri.path_string()],
                row_to_source_file,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Delete entries in one transaction, returning how many rows existed
    pub fn delete_source_files(&mut self, uris: &[FileUri]) -> Result<usize> {
        if uris.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM source_files WHERE path = ?1")?;
            for uri in uris {
                deleted += stmt.execute([uri.path_string()])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    /// Load every entry whose file still exists with the persisted timestamp.
    ///
    /// Rows whose file is missing, was modified since, or cannot be decoded are
    /// deleted and left out of the result.
    pub fn load_valid_source_files(&mut self) -> Result<Vec<SourceFileEntry>> {
        let rows: Vec<(String, rusqlite::Result<SourceFileEntry>)> = {
            let mut stmt = self
                .conn
                .prepare(&format!("SELECT {} FROM source_files", SOURCE_FILE_COLUMNS))?;
            let rows = stmt
                .query_map([], |row| {
                    let path: String = row.get(0)?;
                    Ok((path, row_to_source_file(row)))
                })?
                .collect::<rusqlite::Result<_>>()?;
            rows
        };

        let mut valid = Vec::with_capacity(rows.len());
        let mut stale = Vec::new();
        for (path, decoded) in rows {
            match decoded {
                Ok(entry) if stat_millis(entry.uri.as_path()) == Some(entry.last_modified) => {
                    valid.push(entry);
                }
                Ok(_) => stale.push(path),
                Err(e) => {
                    debug!(path = %path, "dropping undecodable source row: {}", e);
                    stale.push(path);
                }
            }
        }

        self.delete_rows("DELETE FROM source_files WHERE path = ?1", &stale)?;
        info!(loaded = valid.len(), dropped = stale.len(), "loaded persisted source files");
        Ok(valid)
    }

    /// Count persisted source files
    pub fn count_source_files(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM source_files")
    }

    // ========== Module Operations ==========

    /// Insert or replace a module together with its components in one transaction
    pub fn save_module(&mut self, module: &ModuleRegistryEntry) -> Result<()> {
        let result = self.write_module(module);
        if let Err(e) = &result {
            error!(module = %module.name, "module save rolled back: {}", e);
        }
        result
    }

    fn write_module(&mut self, module: &ModuleRegistryEntry) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO modules (name, version, manifest_path, last_modified) VALUES (?1, ?2, ?3, ?4)",
            params![
                module.name,
                module.version,
                module.manifest_path.as_ref().map(FileUri::path_string),
                module.last_modified,
            ],
        )?;
        tx.execute("DELETE FROM components WHERE module_name = ?1", [&module.name])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO components (module_name, name, file_path, is_builtin, is_singleton, version) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for component in module.components.values() {
                stmt.execute(params![
                    module.name,
                    component.name,
                    component.file_path.as_ref().map(FileUri::path_string),
                    component.is_builtin,
                    component.is_singleton,
                    component.version,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete a module and its components, returning whether it existed
    pub fn delete_module(&mut self, name: &str) -> Result<bool> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM components WHERE module_name = ?1", [name])?;
        let deleted = tx.execute("DELETE FROM modules WHERE name = ?1", [name])?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    /// Get a persisted module by name (no validation)
    pub fn get_module(&self, name: &str) -> Result<Option<ModuleRegistryEntry>> {
        let module = self
            .conn
            .query_row(
                "SELECT name, version, manifest_path, last_modified FROM modules WHERE name = ?1",
                [name],
                row_to_module,
            )
            .optional()?;

        match module {
            Some(mut module) => {
                module.components = self.load_components(&module.name)?;
                Ok(Some(module))
            }
            None => Ok(None),
        }
    }

    /// Load every module whose manifest still exists with the persisted timestamp.
    ///
    /// Stale modules are deleted together with their components.
    pub fn load_valid_modules(&mut self) -> Result<Vec<ModuleRegistryEntry>> {
        let rows: Vec<(String, rusqlite::Result<ModuleRegistryEntry>)> = {
            let mut stmt = self
                .conn
                .prepare("SELECT name, version, manifest_path, last_modified FROM modules")?;
            let rows = stmt
                .query_map([], |row| {
                    let name: String = row.get(0)?;
                    Ok((name, row_to_module(row)))
                })?
                .collect::<rusqlite::Result<_>>()?;
            rows
        };

        let mut valid = Vec::with_capacity(rows.len());
        let mut stale = Vec::new();
        for (name, decoded) in rows {
            let mut module = match decoded {
                Ok(module) => module,
                Err(e) => {
                    debug!(module = %name, "dropping undecodable module row: {}", e);
                    stale.push(name);
                    continue;
                }
            };

            let current = match &module.manifest_path {
                Some(manifest) => stat_millis(manifest.as_path()) == module.last_modified,
                None => true,
            };
            if !current {
                stale.push(name);
                continue;
            }

            module.components = self.load_components(&module.name)?;
            if module.components.is_empty() {
                stale.push(name);
            } else {
                valid.push(module);
            }
        }

        if !stale.is_empty() {
            let tx = self.conn.transaction()?;
            for name in &stale {
                tx.execute("DELETE FROM components WHERE module_name = ?1", [name])?;
                tx.execute("DELETE FROM modules WHERE name = ?1", [name])?;
            }
            tx.commit()?;
        }

        info!(loaded = valid.len(), dropped = stale.len(), "loaded persisted modules");
        Ok(valid)
    }

    fn load_components(&self, module_name: &str) -> Result<BTreeMap<String, ComponentRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, file_path, is_builtin, is_singleton, version FROM components WHERE module_name = ?1",
        )?;
        let components = stmt
            .query_map([module_name], row_to_component)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(components
            .into_iter()
            .map(|component| (component.name.clone(), component))
            .collect())
    }

    /// Count persisted modules
    pub fn count_modules(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM modules")
    }

    /// Count persisted components
    pub fn count_components(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM components")
    }

    // ========== Bulk Operations ==========

    /// Delete all data
    pub fn clear_all(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM components", [])?;
        tx.execute("DELETE FROM modules", [])?;
        tx.execute("DELETE FROM source_files", [])?;
        tx.commit()?;
        Ok(())
    }

    /// Delete every source file row
    pub fn clear_source_files(&mut self) -> Result<()> {
        self.conn.execute("DELETE FROM source_files", [])?;
        Ok(())
    }

    /// Delete every module and component row
    pub fn clear_modules(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM components", [])?;
        tx.execute("DELETE FROM modules", [])?;
        tx.commit()?;
        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            source_files: self.count_source_files()?,
            modules: self.count_modules()?,
            components: self.count_components()?,
        })
    }

    fn count(&self, sql: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn delete_rows(&mut self, sql: &str, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(sql)?;
            for key in keys {
                stmt.execute([key])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

// ========== Row Decoding ==========

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn conversion_error(column: usize, err: impl Into<Error>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err.into()))
}

fn json_column<T: DeserializeOwned>(row: &rusqlite::Row, column: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(column, e))
}

fn uri_column(row: &rusqlite::Row, column: usize) -> rusqlite::Result<Option<FileUri>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|path| FileUri::parse(&path).map_err(|e| conversion_error(column, e)))
        .transpose()
}

fn row_to_source_file(row: &rusqlite::Row) -> rusqlite::Result<SourceFileEntry> {
    let path: String = row.get(0)?;
    let uri = FileUri::parse(&path).map_err(|e| conversion_error(0, e))?;

    Ok(SourceFileEntry {
        uri,
        content_hash: row.get(1)?,
        last_modified: row.get(2)?,
        imports: json_column(row, 3)?,
        exports: json_column(row, 4)?,
        symbols: json_column(row, 5)?,
        depends_on: json_column(row, 6)?,
        depended_by: json_column(row, 7)?,
    })
}

/// Components are loaded separately
fn row_to_module(row: &rusqlite::Row) -> rusqlite::Result<ModuleRegistryEntry> {
    Ok(ModuleRegistryEntry {
        name: row.get(0)?,
        version: row.get(1)?,
        manifest_path: uri_column(row, 2)?,
        last_modified: row.get(3)?,
        components: BTreeMap::new(),
    })
}

fn row_to_component(row: &rusqlite::Row) -> rusqlite::Result<ComponentRecord> {
    Ok(ComponentRecord {
        name: row.get(0)?,
        file_path: uri_column(row, 1)?,
        is_builtin: row.get(2)?,
        is_singleton: row.get(3)?,
        version: row.get(4)?,
    })
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbStats {
    pub source_files: usize,
    pub modules: usize,
    pub components: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Source files: {}", self.source_files)?;
        writeln!(f, "  Modules: {}", self.modules)?;
        write!(f, "  Components: {}", self.components)
    }
}
