//! Source-File Indexer - live per-document index kept in sync with disk
//!
//! Pipeline per file: read bytes + stat → digest → (cache hit? return) → parse →
//! extract → commit into the [`FileGraph`].
//!
//! Concurrency rules:
//! - every read → parse → commit cycle for one path runs under that path's lock
//! - graph mutations and their store mirror writes share one graph write-lock
//!   critical section (graph lock first, then store lock)
//! - a scan batch persists only entries still resident and identical at persist time

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use crate::config::IndexConfig;
use crate::graph::FileGraph;
use crate::ignore::{ExcludeFilter, FileMatcher};
use crate::locks::PathLocks;
use crate::storage::SharedStore;
use crate::uri::{modified_millis, normalize_path, FileUri};
use crate::watcher::WatchHandler;
use crate::{Error, Result};
use super::entry::{content_digest, SourceFileEntry};
use super::parser::DocumentParser;

/// How an `index_file` call was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Parsed,
    Cached,
}

/// A file the scan could not index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Summary of one workspace scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Files matched by the walk
    pub files: usize,
    /// Files run through the parser
    pub parsed: usize,
    /// Files served from the resident cache
    pub cached: usize,
    pub failures: Vec<ScanFailure>,
}

impl fmt::Display for ScanStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files: {} parsed, {} cached, {} failed",
            self.files,
            self.parsed,
            self.cached,
            self.failures.len()
        )
    }
}

pub struct SourceFileIndexer {
    root: PathBuf,
    parser: Arc<dyn DocumentParser>,
    graph: RwLock<FileGraph>,
    store: SharedStore,
    matcher: FileMatcher,
    batch_size: usize,
    locks: PathLocks,
}

impl SourceFileIndexer {
    pub fn new(
        root: &Path,
        parser: Arc<dyn DocumentParser>,
        store: SharedStore,
        config: &IndexConfig,
    ) -> Result<Self> {
        let root = normalize_path(&std::path::absolute(root)?);
        let exclude = ExcludeFilter::new(&root, &config.exclude);
        let matcher = FileMatcher::new(&root, &config.source_pattern, Some(exclude))?;

        Ok(Self {
            root,
            parser,
            graph: RwLock::new(FileGraph::new()),
            store,
            matcher,
            batch_size: config.effective_batch_size(),
            locks: PathLocks::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Glob + exclusion used for scans and watcher events
    pub fn matcher(&self) -> &FileMatcher {
        &self.matcher
    }

    /// Index one file into memory without persisting it.
    ///
    /// Returns the resident entry unchanged when digest and timestamp both match;
    /// otherwise parses and replaces it.
    pub async fn index_file(&self, path: &Path) -> Result<SourceFileEntry> {
        let uri = FileUri::from_path(path)?;
        let _guard = self.locks.lock(uri.as_path()).await;
        let (entry, _) = self.index_locked(&uri, false).await?;
        Ok(entry)
    }

    /// Index one file and mirror the result to the store
    pub async fn reindex(&self, path: &Path) -> Result<SourceFileEntry> {
        let uri = FileUri::from_path(path)?;
        let _guard = self.locks.lock(uri.as_path()).await;
        let (entry, _) = self.index_locked(&uri, true).await?;
        Ok(entry)
    }

    /// Caller holds the path lock for `uri`
    async fn index_locked(&self, uri: &FileUri, persist: bool) -> Result<(SourceFileEntry, IndexOutcome)> {
        let bytes = tokio::fs::read(uri.as_path()).await?;
        let metadata = tokio::fs::metadata(uri.as_path()).await?;
        let last_modified = modified_millis(&metadata)?;
        let content_hash = content_digest(&bytes);

        let cached = {
            let graph = self.graph.read();
            graph
                .get(uri)
                .filter(|entry| entry.is_current(&content_hash, last_modified))
                .cloned()
        };
        if let Some(entry) = cached {
            debug!(path = %uri.as_path().display(), "cache hit");
            return Ok((entry, IndexOutcome::Cached));
        }

        let text = String::from_utf8(bytes)
            .map_err(|_| Error::Parse(format!("{} is not valid UTF-8", uri.as_path().display())))?;
        let tree = self.parser.parse(&text)?;
        let entry = SourceFileEntry::from_syntax(uri.clone(), content_hash, last_modified, &tree);
        debug!(
            path = %uri.as_path().display(),
            imports = entry.imports.len(),
            symbols = entry.symbols.len(),
            "parsed"
        );

        Ok((self.commit(entry, persist), IndexOutcome::Parsed))
    }

    /// Insert into the graph and, when asked, persist the entry plus every
    /// resident entry whose reverse edges it touched.
    fn commit(&self, entry: SourceFileEntry, persist: bool) -> SourceFileEntry {
        let mut graph = self.graph.write();
        let previous_targets = graph
            .get(&entry.uri)
            .map(|existing| existing.depends_on.clone())
            .unwrap_or_default();
        let stored = graph.insert(entry).clone();

        if persist {
            let mut rows = vec![stored.clone()];
            for target in previous_targets.iter().chain(&stored.depends_on) {
                if let Some(dependency) = graph.get(target) {
                    if !rows.iter().any(|row| row.uri == dependency.uri) {
                        rows.push(dependency.clone());
                    }
                }
            }
            if let Err(e) = self.store.lock().save_source_files(&rows) {
                warn!(path = %stored.uri.as_path().display(), "entry kept in memory only: {}", e);
            }
        }

        stored
    }

    /// Scan the whole workspace in fixed-size batches.
    ///
    /// Members of a batch run concurrently and all of them settle before the batch
    /// is persisted; a failing member is recorded and never cancels its siblings.
    /// Reverse edges are rebuilt once after the last batch.
    pub async fn index_workspace(self: &Arc<Self>) -> Result<ScanStats> {
        let matcher = self.matcher.clone();
        let files = tokio::task::spawn_blocking(move || matcher.walk())
            .await
            .map_err(|e| Error::Task(e.to_string()))?;

        let mut stats = ScanStats {
            files: files.len(),
            ..ScanStats::default()
        };
        info!(files = files.len(), batch_size = self.batch_size, language = self.parser.language_name(), "scanning source files");

        for batch in files.chunks(self.batch_size) {
            let mut tasks = JoinSet::new();
            let mut task_paths = HashMap::new();
            for path in batch {
                let indexer = Arc::clone(self);
                let task_path = path.clone();
                let handle = tasks.spawn(async move {
                    let uri = FileUri::from_path(&task_path)?;
                    let _guard = indexer.locks.lock(uri.as_path()).await;
                    indexer.index_locked(&uri, false).await
                });
                task_paths.insert(handle.id(), path.clone());
            }

            let mut produced = Vec::new();
            while let Some(joined) = tasks.join_next_with_id().await {
                match joined {
                    Ok((_, Ok((entry, IndexOutcome::Parsed)))) => {
                        stats.parsed += 1;
                        produced.push(entry);
                    }
                    Ok((_, Ok((_, IndexOutcome::Cached)))) => stats.cached += 1,
                    Ok((id, Err(e))) => {
                        let path = task_paths.remove(&id).unwrap_or_default();
                        warn!(path = %path.display(), "failed to index: {}", e);
                        stats.failures.push(ScanFailure {
                            path,
                            message: e.to_string(),
                        });
                    }
                    Err(e) => {
                        let path = task_paths.remove(&e.id()).unwrap_or_default();
                        warn!(path = %path.display(), "index task failed: {}", e);
                        stats.failures.push(ScanFailure {
                            path,
                            message: e.to_string(),
                        });
                    }
                }
            }

            self.persist_batch(&produced);
        }

        self.graph.write().rebuild_reverse_edges();
        info!(
            files = stats.files,
            parsed = stats.parsed,
            cached = stats.cached,
            failed = stats.failures.len(),
            "source scan complete"
        );
        Ok(stats)
    }

    /// Persist the resident versions of `produced` that still match what the batch
    /// parsed; anything replaced or invalidated meanwhile is skipped.
    fn persist_batch(&self, produced: &[SourceFileEntry]) {
        if produced.is_empty() {
            return;
        }

        let graph = self.graph.read();
        let current: Vec<SourceFileEntry> = produced
            .iter()
            .filter_map(|entry| {
                graph
                    .get(&entry.uri)
                    .filter(|live| live.is_current(&entry.content_hash, entry.last_modified))
                    .cloned()
            })
            .collect();

        if current.len() < produced.len() {
            debug!(skipped = produced.len() - current.len(), "entries changed during batch");
        }
        if let Err(e) = self.store.lock().save_source_files(&current) {
            warn!(count = current.len(), "batch kept in memory only: {}", e);
        }
    }

    /// Resident entry for `uri`, if any
    pub fn get(&self, uri: &FileUri) -> Option<SourceFileEntry> {
        self.graph.read().get(uri).cloned()
    }

    /// Resident entry, or a fresh index of the file when it exists on disk
    pub async fn get_or_index(&self, uri: &FileUri) -> Result<Option<SourceFileEntry>> {
        if let Some(entry) = self.get(uri) {
            return Ok(Some(entry));
        }
        if !tokio::fs::try_exists(uri.as_path()).await? {
            return Ok(None);
        }
        self.reindex(uri.as_path()).await.map(Some)
    }

    /// Every resident entry, sorted by URI
    pub fn all_entries(&self) -> Vec<SourceFileEntry> {
        let mut entries: Vec<SourceFileEntry> = self.graph.read().entries().cloned().collect();
        entries.sort_by(|a, b| a.uri.cmp(&b.uri));
        entries
    }

    pub fn len(&self) -> usize {
        self.graph.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.read().is_empty()
    }

    /// Remove `uri` and everything that transitively depends on it, from memory
    /// and from the store. Removed entries are re-indexed lazily.
    pub fn invalidate(&self, uri: &FileUri) -> Vec<FileUri> {
        let mut graph = self.graph.write();
        let removed = graph.invalidate(uri);

        let mut rows = removed.clone();
        if !rows.contains(uri) {
            rows.push(uri.clone());
        }
        if let Err(e) = self.store.lock().delete_source_files(&rows) {
            warn!(count = rows.len(), "failed to delete invalidated rows: {}", e);
        }

        if removed.len() > 1 {
            debug!(path = %uri.as_path().display(), cascade = removed.len() - 1, "invalidated dependents");
        }
        removed
    }

    /// Replace the resident graph with the store's still-valid rows
    pub fn load_from_store(&self) -> Result<usize> {
        let mut graph = self.graph.write();
        let entries = self.store.lock().load_valid_source_files()?;
        graph.load(entries);
        Ok(graph.len())
    }

    /// Drop every resident entry and every persisted source row
    pub fn clear(&self) -> Result<()> {
        let mut graph = self.graph.write();
        self.store.lock().clear_source_files()?;
        graph.clear();
        Ok(())
    }

    /// Whether reverse edges are the exact transpose of live forward edges
    pub fn reverse_edges_consistent(&self) -> bool {
        self.graph.read().reverse_edges_consistent()
    }
}

#[async_trait]
impl WatchHandler for SourceFileIndexer {
    /// Atomic saves arrive as a create over an existing file, so this is a change
    async fn on_create(&self, path: &Path) -> Result<()> {
        self.on_change(path).await
    }

    async fn on_change(&self, path: &Path) -> Result<()> {
        let uri = FileUri::from_path(path)?;
        let _guard = self.locks.lock(uri.as_path()).await;
        self.invalidate(&uri);
        self.index_locked(&uri, true).await?;
        Ok(())
    }

    async fn on_delete(&self, path: &Path) -> Result<()> {
        let uri = FileUri::from_path(path)?;
        let _guard = self.locks.lock(uri.as_path()).await;
        self.invalidate(&uri);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::syntax::SyntaxTree;
    use crate::source::QmlParser;
    use crate::storage::SqliteStore;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Delegates to `QmlParser` and counts calls
    #[derive(Default)]
    struct CountingParser {
        calls: AtomicUsize,
    }

    impl DocumentParser for CountingParser {
        fn language_name(&self) -> &str {
            "qml"
        }

        fn parse(&self, text: &str) -> Result<SyntaxTree> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            QmlParser::new().parse(text)
        }
    }

    struct Workspace {
        dir: TempDir,
        parser: Arc<CountingParser>,
        store: SharedStore,
        indexer: Arc<SourceFileIndexer>,
    }

    impl Workspace {
        fn new(files: &[(&str, &str)]) -> Self {
            let dir = TempDir::new().unwrap();
            for (path, text) in files {
                write(dir.path(), path, text);
            }
            let parser = Arc::new(CountingParser::default());
            let store = SqliteStore::open_in_memory().unwrap().into_shared();
            let config = IndexConfig {
                batch_size: 2,
                ..IndexConfig::default()
            };
            let indexer = Arc::new(
                SourceFileIndexer::new(dir.path(), parser.clone(), store.clone(), &config).unwrap(),
            );
            Self {
                dir,
                parser,
                store,
                indexer,
            }
        }

        fn uri(&self, path: &str) -> FileUri {
            FileUri::from_path(self.dir.path().join(path)).unwrap()
        }

        fn parses(&self) -> usize {
            self.parser.calls.load(Ordering::SeqCst)
        }

        fn rows(&self) -> usize {
            self.store.lock().count_source_files().unwrap()
        }
    }

    fn write(root: &Path, path: &str, text: &str) {
        let path = root.join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[tokio::test]
    async fn test_scan_builds_dependency_edges() {
        let ws = Workspace::new(&[
            ("A.qml", "import QtQuick\nimport \"./B.qml\"\nItem {}\n"),
            ("B.qml", "import QtQuick\nRectangle {}\n"),
        ]);

        let stats = ws.indexer.index_workspace().await.unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.parsed, 2);
        assert!(stats.failures.is_empty());

        let a = ws.indexer.get(&ws.uri("A.qml")).unwrap();
        let b = ws.indexer.get(&ws.uri("B.qml")).unwrap();
        assert_eq!(a.depends_on, vec![ws.uri("B.qml")]);
        assert!(a.depended_by.is_empty());
        assert_eq!(b.depended_by, vec![ws.uri("A.qml")]);
        assert!(ws.indexer.reverse_edges_consistent());
        assert_eq!(ws.rows(), 2);
    }

    #[tokio::test]
    async fn test_unchanged_file_is_served_from_cache() {
        let ws = Workspace::new(&[("A.qml", "Item { property int x: 1 }\n")]);
        let path = ws.dir.path().join("A.qml");

        let first = ws.indexer.index_file(&path).await.unwrap();
        let second = ws.indexer.index_file(&path).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(ws.parses(), 1);

        let stats = ws.indexer.index_workspace().await.unwrap();
        assert_eq!((stats.parsed, stats.cached), (0, 1));
        assert_eq!(ws.parses(), 1);
    }

    #[tokio::test]
    async fn test_parse_failure_is_isolated() {
        let ws = Workspace::new(&[
            ("Good1.qml", "Item {}\n"),
            ("Broken.qml", "Item {\n"),
            ("Good2.qml", "Rectangle {}\n"),
            ("Good3.qml", "Text {}\n"),
        ]);

        let stats = ws.indexer.index_workspace().await.unwrap();
        assert_eq!(stats.files, 4);
        assert_eq!(stats.parsed, 3);
        assert_eq!(stats.failures.len(), 1);
        assert_eq!(stats.failures[0].path, ws.dir.path().join("Broken.qml"));
        assert!(ws.indexer.get(&ws.uri("Broken.qml")).is_none());
        assert_eq!(ws.indexer.len(), 3);
        assert_eq!(ws.rows(), 3);
    }

    #[tokio::test]
    async fn test_change_cascades_and_reindexes_lazily() {
        let ws = Workspace::new(&[
            ("A.qml", "import \"./B.qml\"\nItem {}\n"),
            ("B.qml", "import \"./C.qml\"\nItem {}\n"),
            ("C.qml", "Item {}\n"),
            ("D.qml", "Item {}\n"),
        ]);
        ws.indexer.index_workspace().await.unwrap();

        write(ws.dir.path(), "C.qml", "Item { id: changed }\n");
        ws.indexer.on_change(&ws.dir.path().join("C.qml")).await.unwrap();

        // C re-indexed; A and B dropped until asked for
        assert!(ws.indexer.get(&ws.uri("C.qml")).is_some());
        assert!(ws.indexer.get(&ws.uri("B.qml")).is_none());
        assert!(ws.indexer.get(&ws.uri("A.qml")).is_none());
        assert!(ws.indexer.get(&ws.uri("D.qml")).is_some());
        assert_eq!(ws.rows(), 2);

        let b = ws.indexer.get_or_index(&ws.uri("B.qml")).await.unwrap().unwrap();
        assert_eq!(b.depends_on, vec![ws.uri("C.qml")]);
        let c = ws.indexer.get(&ws.uri("C.qml")).unwrap();
        assert_eq!(c.depended_by, vec![ws.uri("B.qml")]);
        assert!(ws.indexer.reverse_edges_consistent());
    }

    #[tokio::test]
    async fn test_delete_removes_entry_and_row() {
        let ws = Workspace::new(&[
            ("A.qml", "import \"./B.qml\"\nItem {}\n"),
            ("B.qml", "Item {}\n"),
        ]);
        ws.indexer.index_workspace().await.unwrap();

        std::fs::remove_file(ws.dir.path().join("B.qml")).unwrap();
        ws.indexer.on_delete(&ws.dir.path().join("B.qml")).await.unwrap();

        assert!(ws.indexer.is_empty());
        assert_eq!(ws.rows(), 0);
        assert!(ws.indexer.get_or_index(&ws.uri("B.qml")).await.unwrap().is_none());

        // A comes back on request, with a dangling dependency on B
        let a = ws.indexer.get_or_index(&ws.uri("A.qml")).await.unwrap().unwrap();
        assert_eq!(a.depends_on, vec![ws.uri("B.qml")]);
        assert!(ws.indexer.reverse_edges_consistent());
    }

    #[tokio::test]
    async fn test_load_from_store_skips_parsing() {
        let ws = Workspace::new(&[
            ("A.qml", "import \"./B.qml\"\nItem {}\n"),
            ("B.qml", "Item {}\n"),
        ]);
        ws.indexer.index_workspace().await.unwrap();
        assert_eq!(ws.parses(), 2);

        let parser = Arc::new(CountingParser::default());
        let reopened = Arc::new(
            SourceFileIndexer::new(ws.dir.path(), parser.clone(), ws.store.clone(), &IndexConfig::default()).unwrap(),
        );
        assert_eq!(reopened.load_from_store().unwrap(), 2);

        let stats = reopened.index_workspace().await.unwrap();
        assert_eq!((stats.parsed, stats.cached), (0, 2));
        assert_eq!(parser.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            reopened.get(&ws.uri("B.qml")).unwrap().depended_by,
            vec![ws.uri("A.qml")]
        );
    }

    #[tokio::test]
    async fn test_create_event_persists() {
        let ws = Workspace::new(&[]);
        write(ws.dir.path(), "New.qml", "Item {}\n");
        ws.indexer.on_create(&ws.dir.path().join("New.qml")).await.unwrap();
        assert!(ws.indexer.get(&ws.uri("New.qml")).is_some());
        assert_eq!(ws.rows(), 1);

        ws.indexer.clear().unwrap();
        assert!(ws.indexer.is_empty());
        assert_eq!(ws.rows(), 0);
    }

    /// Blocks on documents containing `gate` until released
    #[derive(Default)]
    struct GatedParser {
        entered: AtomicBool,
        open: std::sync::Mutex<bool>,
        opened: std::sync::Condvar,
    }

    impl GatedParser {
        fn release(&self) {
            *self.open.lock().unwrap() = true;
            self.opened.notify_all();
        }
    }

    impl DocumentParser for GatedParser {
        fn language_name(&self) -> &str {
            "qml"
        }

        fn parse(&self, text: &str) -> Result<SyntaxTree> {
            if text.contains("gate") {
                self.entered.store(true, Ordering::SeqCst);
                let mut open = self.open.lock().unwrap();
                while !*open {
                    open = self.opened.wait(open).unwrap();
                }
            }
            QmlParser::new().parse(text)
        }
    }

    /// Starts a scan over `A.qml` + gated `G.qml` (one batch) and returns once A is
    /// resident and G is parked in the parser
    async fn scan_in_flight(
        dir: &TempDir,
        store: &SharedStore,
    ) -> (Arc<SourceFileIndexer>, Arc<GatedParser>, tokio::task::JoinHandle<Result<ScanStats>>) {
        write(dir.path(), "A.qml", "Item { id: before }\n");
        write(dir.path(), "G.qml", "// gate\nItem {}\n");

        let parser = Arc::new(GatedParser::default());
        let config = IndexConfig {
            batch_size: 2,
            ..IndexConfig::default()
        };
        let indexer = Arc::new(SourceFileIndexer::new(dir.path(), parser.clone(), store.clone(), &config).unwrap());

        let scan = tokio::spawn({
            let indexer = Arc::clone(&indexer);
            async move { indexer.index_workspace().await }
        });

        let a = FileUri::from_path(dir.path().join("A.qml")).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(10), async {
            while !(parser.entered.load(Ordering::SeqCst) && indexer.get(&a).is_some()) {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        (indexer, parser, scan)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_scan_batch_keeps_newer_watcher_entry() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open_in_memory().unwrap().into_shared();
        let (indexer, parser, scan) = scan_in_flight(&dir, &store).await;
        let a = FileUri::from_path(dir.path().join("A.qml")).unwrap();
        let stale_hash = indexer.get(&a).unwrap().content_hash;

        write(dir.path(), "A.qml", "Rectangle { id: after }\n");
        indexer.on_change(&dir.path().join("A.qml")).await.unwrap();
        let fresh_hash = indexer.get(&a).unwrap().content_hash;
        assert_ne!(stale_hash, fresh_hash);

        parser.release();
        let stats = scan.await.unwrap().unwrap();
        assert_eq!(stats.parsed, 2);

        let row = store.lock().get_source_file(&a).unwrap().unwrap();
        assert_eq!(row.content_hash, fresh_hash);
        assert_eq!(indexer.get(&a).unwrap().content_hash, fresh_hash);
        assert_eq!(store.lock().count_source_files().unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_scan_batch_does_not_resurrect_deleted_entry() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open_in_memory().unwrap().into_shared();
        let (indexer, parser, scan) = scan_in_flight(&dir, &store).await;
        let a = FileUri::from_path(dir.path().join("A.qml")).unwrap();

        std::fs::remove_file(dir.path().join("A.qml")).unwrap();
        indexer.on_delete(&dir.path().join("A.qml")).await.unwrap();

        parser.release();
        scan.await.unwrap().unwrap();

        assert!(indexer.get(&a).is_none());
        assert!(store.lock().get_source_file(&a).unwrap().is_none());
        assert_eq!(store.lock().count_source_files().unwrap(), 1);
        assert!(indexer.reverse_edges_consistent());
    }

    #[tokio::test]
    async fn test_create_over_existing_file_cascades() {
        let ws = Workspace::new(&[
            ("A.qml", "import \"./B.qml\"\nItem {}\n"),
            ("B.qml", "Item {}\n"),
        ]);
        ws.indexer.index_workspace().await.unwrap();

        // write-to-temp then rename, as editors do on save
        write(ws.dir.path(), "B.qml.tmp", "Rectangle { id: saved }\n");
        std::fs::rename(ws.dir.path().join("B.qml.tmp"), ws.dir.path().join("B.qml")).unwrap();
        ws.indexer.on_create(&ws.dir.path().join("B.qml")).await.unwrap();

        assert!(ws.indexer.get(&ws.uri("A.qml")).is_none());
        let b = ws.indexer.get(&ws.uri("B.qml")).unwrap();
        assert_eq!(b.exports.root_component_type.as_deref(), Some("Rectangle"));
        assert_eq!(ws.rows(), 1);
        assert!(ws.indexer.reverse_edges_consistent());
    }
}
