//! Database schema definitions

/// SQL to create the source_files table
///
/// List-valued columns hold JSON arrays/objects. The CHECK constraints turn an
/// empty key or digest into a statement error, which rolls back its batch.
pub const CREATE_SOURCE_FILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS source_files (
    path TEXT PRIMARY KEY CHECK (length(path) > 0),
    content_hash TEXT NOT NULL CHECK (length(content_hash) > 0),
    last_modified INTEGER NOT NULL,
    imports TEXT NOT NULL,
    exports TEXT NOT NULL,
    symbols TEXT NOT NULL,
    depends_on TEXT NOT NULL,
    depended_by TEXT NOT NULL
)
"#;

/// SQL to create the modules table
pub const CREATE_MODULES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS modules (
    name TEXT PRIMARY KEY CHECK (length(name) > 0),
    version TEXT NOT NULL,
    manifest_path TEXT,
    last_modified INTEGER
)
"#;

/// SQL to create the components table
pub const CREATE_COMPONENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS components (
    module_name TEXT NOT NULL REFERENCES modules(name) ON DELETE CASCADE,
    name TEXT NOT NULL CHECK (length(name) > 0),
    file_path TEXT,
    is_builtin INTEGER NOT NULL DEFAULT 0,
    is_singleton INTEGER NOT NULL DEFAULT 0,
    version TEXT,
    PRIMARY KEY (module_name, name)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_modules_manifest ON modules(manifest_path)",
    "CREATE INDEX IF NOT EXISTS idx_components_module ON components(module_name)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_SOURCE_FILES_TABLE,
        CREATE_MODULES_TABLE,
        CREATE_COMPONENTS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
