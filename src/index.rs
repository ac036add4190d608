//! Workspace index facade
//!
//! Owns the store, both indexers and their watchers. Lifecycle:
//! [`open`](WorkspaceIndex::open) → [`init`](WorkspaceIndex::init) (load persisted
//! rows, start watchers, scan) → queries → [`dispose`](WorkspaceIndex::dispose).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;
use crate::config::{ensure_db_dir, IndexConfig};
use crate::module::{ComponentRecord, ManifestScanStats, ModuleIndexer, ModuleRegistryEntry};
use crate::source::{DocumentParser, QmlParser, ScanStats, SourceFileEntry, SourceFileIndexer};
use crate::storage::{DbStats, SharedStore, SqliteStore};
use crate::uri::FileUri;
use crate::watcher::{FileWatcher, WatchHandler};
use crate::Result;

/// Results of one full workspace scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkspaceScan {
    pub sources: ScanStats,
    pub modules: ManifestScanStats,
}

impl fmt::Display for WorkspaceScan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sources: {}", self.sources)?;
        write!(f, "Manifests: {}", self.modules)
    }
}

pub struct WorkspaceIndex {
    root: PathBuf,
    config: IndexConfig,
    store: SharedStore,
    sources: Arc<SourceFileIndexer>,
    modules: Arc<ModuleIndexer>,
    watchers: Mutex<Vec<FileWatcher>>,
}

impl WorkspaceIndex {
    /// Open the on-disk store for `root` (creating its directory) with the default parser
    pub fn open(root: &Path, config: IndexConfig) -> Result<Self> {
        let db_path = config.database_path(root);
        ensure_db_dir(&db_path)?;
        let store = SqliteStore::open(&db_path)?.into_shared();
        Self::with_parts(root, store, Arc::new(QmlParser::new()), config)
    }

    /// Assemble an index from an existing store and parser
    pub fn with_parts(
        root: &Path,
        store: SharedStore,
        parser: Arc<dyn DocumentParser>,
        config: IndexConfig,
    ) -> Result<Self> {
        let sources = Arc::new(SourceFileIndexer::new(root, parser, store.clone(), &config)?);
        let modules = Arc::new(ModuleIndexer::new(root, store.clone(), &config)?);

        Ok(Self {
            root: sources.root().to_path_buf(),
            config,
            store,
            sources,
            modules,
            watchers: Mutex::new(Vec::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn sources(&self) -> &Arc<SourceFileIndexer> {
        &self.sources
    }

    pub fn modules(&self) -> &Arc<ModuleIndexer> {
        &self.modules
    }

    /// Load persisted rows, start watchers (when configured) and scan the workspace
    pub async fn init(&self) -> Result<WorkspaceScan> {
        self.load_from_store()?;
        if self.config.watch {
            self.start_watchers()?;
        }
        self.index_workspace().await
    }

    /// Replace both resident indices with the store's still-valid rows
    pub fn load_from_store(&self) -> Result<(usize, usize)> {
        let files = self.sources.load_from_store()?;
        let modules = self.modules.load_from_store()?;
        info!(files, modules, "loaded persisted index");
        Ok((files, modules))
    }

    /// Subscribe both indexers to file-system events. No-op when already watching.
    pub fn start_watchers(&self) -> Result<()> {
        let mut watchers = self.watchers.lock();
        if !watchers.is_empty() {
            return Ok(());
        }

        let sources: Arc<dyn WatchHandler> = self.sources.clone();
        let modules: Arc<dyn WatchHandler> = self.modules.clone();
        watchers.push(FileWatcher::start("sources", self.sources.matcher().clone(), sources)?);
        watchers.push(FileWatcher::start("manifests", self.modules.matcher().clone(), modules)?);
        info!(root = %self.root.display(), "watching workspace");
        Ok(())
    }

    pub fn is_watching(&self) -> bool {
        !self.watchers.lock().is_empty()
    }

    /// Scan sources and manifests concurrently
    pub async fn index_workspace(&self) -> Result<WorkspaceScan> {
        let (sources, modules) = tokio::join!(self.sources.index_workspace(), self.modules.index_all());
        let scan = WorkspaceScan {
            sources: sources?,
            modules: modules?,
        };
        info!(
            files = scan.sources.files,
            manifests = scan.modules.manifests,
            "workspace indexed"
        );
        Ok(scan)
    }

    /// Entry for `uri`; a missing entry whose file exists is indexed on demand
    pub async fn get_file_entry(&self, uri: &FileUri) -> Result<Option<SourceFileEntry>> {
        self.sources.get_or_index(uri).await
    }

    /// Resident entry only, never touching disk
    pub fn cached_file_entry(&self, uri: &FileUri) -> Option<SourceFileEntry> {
        self.sources.get(uri)
    }

    pub fn get_all_file_entries(&self) -> Vec<SourceFileEntry> {
        self.sources.all_entries()
    }

    pub fn resolve_module(&self, name: &str, version: Option<&str>) -> Option<ModuleRegistryEntry> {
        self.modules.resolve_module(name, version)
    }

    pub fn resolve_component(
        &self,
        module_name: &str,
        component_name: &str,
        version: Option<&str>,
    ) -> Option<ComponentRecord> {
        self.modules.resolve_component(module_name, component_name, version)
    }

    pub fn get_all_modules(&self) -> Vec<ModuleRegistryEntry> {
        self.modules.all_modules()
    }

    /// Drop both in-memory indices and every persisted row. Builtins remain.
    pub fn clear_cache(&self) -> Result<()> {
        self.sources.clear()?;
        self.modules.clear()?;
        info!("index cache cleared");
        Ok(())
    }

    pub fn stats(&self) -> Result<DbStats> {
        self.store.lock().stats()
    }

    /// Stop every watcher. The store closes once the last owner drops it.
    pub async fn dispose(&self) {
        let watchers = std::mem::take(&mut *self.watchers.lock());
        for watcher in watchers {
            watcher.stop().await;
        }
    }
}
