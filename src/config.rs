use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::{Error, Result};

pub const CONFIG_FILE_NAME: &str = "qmlscope.toml";
pub const STATE_DIR_NAME: &str = ".qmlscope";

/// Index settings, read from `qmlscope.toml` at the workspace root.
///
/// Every field has a default, so an empty or partial file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Database location; `<root>/.qmlscope/index.db` when unset
    pub database: Option<PathBuf>,
    /// Glob for source documents, relative to the root
    pub source_pattern: String,
    /// Glob for module manifests, relative to the root
    pub manifest_pattern: String,
    /// Extra gitignore-style exclusions
    pub exclude: Vec<String>,
    /// Files per scan batch
    pub batch_size: usize,
    /// Directory names under which manifest paths spell the module name
    pub module_root_markers: Vec<String>,
    /// Subscribe to file-system events after startup
    pub watch: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            database: None,
            source_pattern: "**/*.qml".to_string(),
            manifest_pattern: "**/qmldir".to_string(),
            exclude: Vec::new(),
            batch_size: 50,
            module_root_markers: vec!["qml".to_string(), "imports".to_string(), "modules".to_string()],
            watch: true,
        }
    }
}

impl IndexConfig {
    /// Batch size, never below one
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    /// Configured database path resolved against `root`, or the default location
    pub fn database_path(&self, root: &Path) -> PathBuf {
        match &self.database {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root.join(path),
            None => default_database_path_in(root),
        }
    }
}

pub fn default_config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(STATE_DIR_NAME).join("index.db")
}

/// Load `path`, returning `None` when the file does not exist
pub fn load_config(path: &Path) -> Result<Option<IndexConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path)?;
    let config: IndexConfig = toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &IndexConfig, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::Config(format!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        )));
    }

    let contents = toml::to_string_pretty(config).map_err(|e| Error::Config(e.to_string()))?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Append the state directory to the workspace `.gitignore` unless already listed
pub fn ensure_gitignore(project_root: &Path) -> Result<()> {
    let gitignore_path = project_root.join(".gitignore");
    let entry = format!("{}/", STATE_DIR_NAME);

    let mut content = String::new();
    if gitignore_path.exists() {
        content = std::fs::read_to_string(&gitignore_path)?;
        if content.lines().any(|line| line.trim() == entry) {
            return Ok(());
        }
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
    }
    content.push_str(&entry);
    content.push('\n');
    std::fs::write(&gitignore_path, content)?;
    Ok(())
}
