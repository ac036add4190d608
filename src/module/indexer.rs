//! Module Indexer - `qmldir` manifests → module registry
//!
//! A manifest is indexed at most once per registry lifetime: if a module read from
//! the same manifest path is already resident, the parse is skipped. Callers that
//! need a re-read (the watch handler on change) remove the stale module first.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};
use crate::config::IndexConfig;
use crate::ignore::{ExcludeFilter, FileMatcher};
use crate::locks::PathLocks;
use crate::source::ScanFailure;
use crate::storage::SharedStore;
use crate::uri::{modified_millis, normalize_path, FileUri};
use crate::watcher::WatchHandler;
use crate::{Error, Result};
use super::builtins::builtin_modules;
use super::manifest::{parse_manifest, Directive};
use super::registry::{compare_versions, ComponentRecord, ModuleRegistry, ModuleRegistryEntry, DEFAULT_MODULE_VERSION};

/// Summary of one manifest scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManifestScanStats {
    pub manifests: usize,
    /// Manifests that produced a module
    pub registered: usize,
    /// Manifests already resident
    pub skipped: usize,
    /// Manifests without any component declaration
    pub empty: usize,
    pub failures: Vec<ScanFailure>,
}

impl fmt::Display for ManifestScanStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} manifests: {} registered, {} already indexed, {} empty, {} failed",
            self.manifests,
            self.registered,
            self.skipped,
            self.empty,
            self.failures.len()
        )
    }
}

enum ManifestOutcome {
    Registered(ModuleRegistryEntry),
    AlreadyIndexed(ModuleRegistryEntry),
    Empty,
}

impl ManifestOutcome {
    fn into_module(self) -> Option<ModuleRegistryEntry> {
        match self {
            ManifestOutcome::Registered(module) | ManifestOutcome::AlreadyIndexed(module) => Some(module),
            ManifestOutcome::Empty => None,
        }
    }
}

pub struct ModuleIndexer {
    root: PathBuf,
    registry: RwLock<ModuleRegistry>,
    store: SharedStore,
    matcher: FileMatcher,
    markers: Vec<String>,
    locks: PathLocks,
}

impl ModuleIndexer {
    pub fn new(root: &Path, store: SharedStore, config: &IndexConfig) -> Result<Self> {
        let root = normalize_path(&std::path::absolute(root)?);
        let exclude = ExcludeFilter::new(&root, &config.exclude);
        let matcher = FileMatcher::new(&root, &config.manifest_pattern, Some(exclude))?;

        Ok(Self {
            root,
            registry: RwLock::new(ModuleRegistry::new()),
            store,
            matcher,
            markers: config.module_root_markers.clone(),
            locks: PathLocks::new(),
        })
    }

    /// Glob + exclusion used for scans and watcher events
    pub fn matcher(&self) -> &FileMatcher {
        &self.matcher
    }

    /// Parse a manifest and register its module.
    ///
    /// Returns `None` when the manifest declares no components. If a module from
    /// this manifest is already registered, that module is returned without
    /// re-reading the file; call [`remove_manifest`](Self::remove_manifest) first to
    /// force a re-read.
    pub async fn index_manifest(&self, path: &Path) -> Result<Option<ModuleRegistryEntry>> {
        let uri = FileUri::from_path(path)?;
        let _guard = self.locks.lock(uri.as_path()).await;
        Ok(self.index_locked(&uri).await?.into_module())
    }

    /// Caller holds the path lock for `manifest`
    async fn index_locked(&self, manifest: &FileUri) -> Result<ManifestOutcome> {
        let existing = self.registry.read().find_by_manifest(manifest).cloned();
        if let Some(module) = existing {
            debug!(manifest = %manifest.as_path().display(), module = %module.name, "manifest already indexed");
            return Ok(ManifestOutcome::AlreadyIndexed(module));
        }

        let text = tokio::fs::read_to_string(manifest.as_path()).await?;
        let metadata = tokio::fs::metadata(manifest.as_path()).await?;
        let last_modified = modified_millis(&metadata)?;

        let directives = parse_manifest(&text);
        let Some(module) = build_module(manifest, Some(last_modified), &directives, &self.root, &self.markers)
        else {
            debug!(manifest = %manifest.as_path().display(), "manifest declares no components");
            return Ok(ManifestOutcome::Empty);
        };

        debug!(
            manifest = %manifest.as_path().display(),
            module = %module.name,
            components = module.components.len(),
            "registered module"
        );
        self.commit(module.clone());
        Ok(ManifestOutcome::Registered(module))
    }

    fn commit(&self, module: ModuleRegistryEntry) {
        let mut registry = self.registry.write();
        if let Some(previous) = registry.get(&module.name) {
            if previous.manifest_path != module.manifest_path {
                warn!(
                    module = %module.name,
                    previous = ?previous.manifest_path.as_ref().map(|uri| uri.as_path().display().to_string()),
                    replacement = ?module.manifest_path.as_ref().map(|uri| uri.as_path().display().to_string()),
                    "module declared by more than one manifest; keeping the latest"
                );
            }
        }
        if let Err(e) = self.store.lock().save_module(&module) {
            warn!(module = %module.name, "module kept in memory only: {}", e);
        }
        registry.insert(module);
    }

    /// Index every manifest in the workspace
    pub async fn index_all(&self) -> Result<ManifestScanStats> {
        let matcher = self.matcher.clone();
        let manifests = tokio::task::spawn_blocking(move || matcher.walk())
            .await
            .map_err(|e| Error::Task(e.to_string()))?;

        let mut stats = ManifestScanStats {
            manifests: manifests.len(),
            ..ManifestScanStats::default()
        };

        for path in manifests {
            let outcome = match FileUri::from_path(&path) {
                Ok(uri) => {
                    let _guard = self.locks.lock(uri.as_path()).await;
                    self.index_locked(&uri).await
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(ManifestOutcome::Registered(_)) => stats.registered += 1,
                Ok(ManifestOutcome::AlreadyIndexed(_)) => stats.skipped += 1,
                Ok(ManifestOutcome::Empty) => stats.empty += 1,
                Err(e) => {
                    warn!(path = %path.display(), "failed to index manifest: {}", e);
                    stats.failures.push(ScanFailure {
                        path,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            manifests = stats.manifests,
            registered = stats.registered,
            skipped = stats.skipped,
            "manifest scan complete"
        );
        Ok(stats)
    }

    /// Name of the module read from `manifest`, if resident
    pub fn module_name_for_manifest(&self, manifest: &FileUri) -> Option<String> {
        self.registry
            .read()
            .find_by_manifest(manifest)
            .map(|module| module.name.clone())
    }

    /// Remove a module and its components from memory and the store
    pub fn remove_module(&self, name: &str) -> bool {
        let mut registry = self.registry.write();
        let removed = registry.remove(name).is_some();
        if let Err(e) = self.store.lock().delete_module(name) {
            warn!(module = %name, "failed to delete module row: {}", e);
        }
        removed
    }

    /// Remove whichever module was read from `manifest`, returning its name
    pub fn remove_manifest(&self, manifest: &FileUri) -> Option<String> {
        let name = self.module_name_for_manifest(manifest)?;
        self.remove_module(&name);
        debug!(manifest = %manifest.as_path().display(), module = %name, "removed module");
        Some(name)
    }

    /// Exact name, then suffix match, among user modules; then the same among builtins.
    ///
    /// `version` does not filter modules.
    pub fn resolve_module(&self, name: &str, _version: Option<&str>) -> Option<ModuleRegistryEntry> {
        let user = self.registry.read().resolve(name).cloned();
        user.or_else(|| builtin_modules().resolve(name).cloned())
    }

    /// Component lookup within the resolved module, honoring `version`
    pub fn resolve_component(
        &self,
        module_name: &str,
        component_name: &str,
        version: Option<&str>,
    ) -> Option<ComponentRecord> {
        self.resolve_module(module_name, version)?
            .component(component_name, version)
            .cloned()
    }

    /// User modules plus every builtin not shadowed by one, sorted by name
    pub fn all_modules(&self) -> Vec<ModuleRegistryEntry> {
        let registry = self.registry.read();
        let mut modules: Vec<ModuleRegistryEntry> = registry.modules().cloned().collect();
        modules.extend(
            builtin_modules()
                .modules()
                .filter(|builtin| !registry.contains(&builtin.name))
                .cloned(),
        );
        modules.sort_by(|a, b| a.name.cmp(&b.name));
        modules
    }

    /// Number of resident user modules
    pub fn len(&self) -> usize {
        self.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.read().is_empty()
    }

    /// Replace the resident registry with the store's still-valid modules
    pub fn load_from_store(&self) -> Result<usize> {
        let mut registry = self.registry.write();
        let modules = self.store.lock().load_valid_modules()?;
        registry.clear();
        for module in modules {
            registry.insert(module);
        }
        Ok(registry.len())
    }

    /// Drop every user module from memory and the store. Builtins are unaffected.
    pub fn clear(&self) -> Result<()> {
        let mut registry = self.registry.write();
        self.store.lock().clear_modules()?;
        registry.clear();
        Ok(())
    }
}

#[async_trait]
impl WatchHandler for ModuleIndexer {
    /// Atomic saves arrive as a create over an existing manifest, so this is a change
    async fn on_create(&self, path: &Path) -> Result<()> {
        self.on_change(path).await
    }

    async fn on_change(&self, path: &Path) -> Result<()> {
        let uri = FileUri::from_path(path)?;
        let _guard = self.locks.lock(uri.as_path()).await;
        self.remove_manifest(&uri);
        self.index_locked(&uri).await?;
        Ok(())
    }

    async fn on_delete(&self, path: &Path) -> Result<()> {
        let uri = FileUri::from_path(path)?;
        let _guard = self.locks.lock(uri.as_path()).await;
        self.remove_manifest(&uri);
        Ok(())
    }
}

/// Build a registry entry from manifest directives.
///
/// Returns `None` when no component or singleton is declared. Repeated type
/// declarations keep the highest version.
pub fn build_module(
    manifest: &FileUri,
    last_modified: Option<i64>,
    directives: &[Directive],
    root: &Path,
    markers: &[String],
) -> Option<ModuleRegistryEntry> {
    let mut explicit_name: Option<&str> = None;
    let mut components: BTreeMap<String, ComponentRecord> = BTreeMap::new();

    for directive in directives {
        let (name, version, path, is_singleton) = match directive {
            Directive::Module { name } => {
                explicit_name.get_or_insert(name.as_str());
                continue;
            }
            Directive::Component { name, version, path } => (name, version, path, false),
            Directive::Singleton { name, version, path } => (name, version, path, true),
            _ => continue,
        };

        let newer = match components.get(name) {
            Some(existing) => {
                compare_versions(version.as_deref(), existing.version.as_deref()) == Ordering::Greater
            }
            None => true,
        };
        if newer {
            components.insert(
                name.clone(),
                ComponentRecord {
                    name: name.clone(),
                    file_path: Some(manifest.resolve_relative(path)),
                    is_builtin: false,
                    is_singleton,
                    version: version.clone(),
                },
            );
        }
    }

    if components.is_empty() {
        return None;
    }

    let name = match explicit_name {
        Some(name) => name.to_string(),
        None => {
            let dir = manifest.parent_dir()?;
            infer_module_name(root, dir, markers)
        }
    };
    if name.is_empty() {
        return None;
    }

    let version = components
        .values()
        .filter_map(|component| component.version.as_deref())
        .max_by(|a, b| compare_versions(Some(*a), Some(*b)))
        .unwrap_or(DEFAULT_MODULE_VERSION)
        .to_string();

    Some(ModuleRegistryEntry {
        name,
        version,
        manifest_path: Some(manifest.clone()),
        last_modified,
        components,
    })
}

/// Module name for a manifest directory without a `module` line.
///
/// Segments after the first marker directory (scanning from the root) joined with
/// `.`; the directory's own name when no marker is found or the marker is last.
pub fn infer_module_name(root: &Path, manifest_dir: &Path, markers: &[String]) -> String {
    let segments: Vec<String> = manifest_dir
        .strip_prefix(root)
        .map(|relative| {
            relative
                .components()
                .filter_map(|component| match component {
                    Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    if let Some(position) = segments.iter().position(|segment| markers.contains(segment)) {
        if position + 1 < segments.len() {
            return segments[position + 1..].join(".");
        }
    }

    manifest_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use tempfile::TempDir;

    struct Workspace {
        dir: TempDir,
        store: SharedStore,
        indexer: ModuleIndexer,
    }

    impl Workspace {
        fn new(files: &[(&str, &str)]) -> Self {
            let dir = TempDir::new().unwrap();
            for (path, text) in files {
                write(dir.path(), path, text);
            }
            let store = SqliteStore::open_in_memory().unwrap().into_shared();
            let indexer = ModuleIndexer::new(dir.path(), store.clone(), &IndexConfig::default()).unwrap();
            Self { dir, store, indexer }
        }

        fn path(&self, path: &str) -> PathBuf {
            self.dir.path().join(path)
        }

        fn uri(&self, path: &str) -> FileUri {
            FileUri::from_path(self.path(path)).unwrap()
        }

        fn persisted(&self) -> (usize, usize) {
            let store = self.store.lock();
            (store.count_modules().unwrap(), store.count_components().unwrap())
        }
    }

    fn write(root: &Path, path: &str, text: &str) {
        let path = root.join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    fn markers() -> Vec<String> {
        IndexConfig::default().module_root_markers
    }

    #[tokio::test]
    async fn test_singleton_manifest() {
        let ws = Workspace::new(&[(
            "qml/Foo/Bar/qmldir",
            "module Foo.Bar\nsingleton Theme 1.0 Theme.qml\n",
        )]);

        let module = ws.indexer.index_manifest(&ws.path("qml/Foo/Bar/qmldir")).await.unwrap().unwrap();
        assert_eq!(module.name, "Foo.Bar");
        assert_eq!(module.version, "1.0");
        assert_eq!(module.components.len(), 1);

        let theme = &module.components["Theme"];
        assert!(theme.is_singleton);
        assert!(!theme.is_builtin);
        assert_eq!(theme.version.as_deref(), Some("1.0"));
        assert_eq!(theme.file_path, Some(ws.uri("qml/Foo/Bar/Theme.qml")));

        assert_eq!(ws.persisted(), (1, 1));
        assert_eq!(
            ws.indexer.resolve_component("Foo.Bar", "Theme", None).unwrap(),
            theme.clone()
        );
    }

    #[tokio::test]
    async fn test_empty_manifest_registers_nothing() {
        let ws = Workspace::new(&[("qml/Empty/qmldir", "module Empty\n# no types\nplugin emptyplugin\n")]);

        assert!(ws.indexer.index_manifest(&ws.path("qml/Empty/qmldir")).await.unwrap().is_none());
        assert!(ws.indexer.is_empty());
        assert!(ws.indexer.resolve_module("Empty", None).is_none());
        assert_eq!(ws.persisted(), (0, 0));
    }

    #[tokio::test]
    async fn test_versioned_history_keeps_highest() {
        let ws = Workspace::new(&[(
            "imports/Acme/Controls/qmldir",
            "Button 1.0 ButtonLegacy.qml\nButton 1.3 Button.qml\nButton 1.2 ButtonOld.qml\nPanel Panel.qml\n",
        )]);

        let module = ws
            .indexer
            .index_manifest(&ws.path("imports/Acme/Controls/qmldir"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(module.name, "Acme.Controls");
        assert_eq!(module.version, "1.3");
        assert_eq!(module.components["Button"].file_path, Some(ws.uri("imports/Acme/Controls/Button.qml")));
        assert_eq!(module.components["Panel"].version, None);

        assert!(ws.indexer.resolve_component("Controls", "Button", Some("1.5")).is_some());
        assert!(ws.indexer.resolve_component("Controls", "Button", Some("1.2")).is_none());
    }

    #[tokio::test]
    async fn test_reparse_is_skipped_until_removed() {
        let ws = Workspace::new(&[("qml/Kit/qmldir", "Knob 1.0 Knob.qml\n")]);
        let manifest = ws.path("qml/Kit/qmldir");
        ws.indexer.index_manifest(&manifest).await.unwrap();

        write(ws.dir.path(), "qml/Kit/qmldir", "Knob 1.0 Knob.qml\nDial 1.0 Dial.qml\n");
        let again = ws.indexer.index_manifest(&manifest).await.unwrap().unwrap();
        assert_eq!(again.components.len(), 1);

        ws.indexer.on_change(&manifest).await.unwrap();
        let module = ws.indexer.resolve_module("Kit", None).unwrap();
        assert_eq!(module.components.len(), 2);
        assert_eq!(ws.persisted(), (1, 2));
    }

    #[tokio::test]
    async fn test_change_that_renames_module_drops_old_name() {
        let ws = Workspace::new(&[("qml/Kit/qmldir", "module Old.Kit\nKnob 1.0 Knob.qml\n")]);
        let manifest = ws.path("qml/Kit/qmldir");
        ws.indexer.index_manifest(&manifest).await.unwrap();

        write(ws.dir.path(), "qml/Kit/qmldir", "module New.Kit\nKnob 1.0 Knob.qml\n");
        ws.indexer.on_change(&manifest).await.unwrap();

        assert!(ws.indexer.resolve_module("Old.Kit", None).is_none());
        assert!(ws.indexer.resolve_module("New.Kit", None).is_some());
        assert_eq!(ws.persisted(), (1, 1));
    }

    #[tokio::test]
    async fn test_create_over_registered_manifest_reparses() {
        let ws = Workspace::new(&[("qml/Kit/qmldir", "Knob 1.0 Knob.qml\n")]);
        let manifest = ws.path("qml/Kit/qmldir");
        ws.indexer.index_manifest(&manifest).await.unwrap();

        write(ws.dir.path(), "qml/Kit/qmldir.tmp", "Knob 1.0 Knob.qml\nDial 1.0 Dial.qml\n");
        std::fs::rename(ws.path("qml/Kit/qmldir.tmp"), &manifest).unwrap();
        ws.indexer.on_create(&manifest).await.unwrap();

        let module = ws.indexer.resolve_module("Kit", None).unwrap();
        assert_eq!(module.components.len(), 2);
        assert_eq!(ws.persisted(), (1, 2));
    }

    #[tokio::test]
    async fn test_duplicate_module_name_keeps_latest_manifest() {
        let ws = Workspace::new(&[
            ("qml/One/qmldir", "module Shared.Kit\nKnob 1.0 Knob.qml\n"),
            ("qml/Two/qmldir", "module Shared.Kit\nDial 1.0 Dial.qml\n"),
        ]);
        let one = ws.path("qml/One/qmldir");
        let two = ws.path("qml/Two/qmldir");
        ws.indexer.index_manifest(&one).await.unwrap();
        ws.indexer.index_manifest(&two).await.unwrap();

        let module = ws.indexer.resolve_module("Shared.Kit", None).unwrap();
        assert_eq!(module.manifest_path, Some(ws.uri("qml/Two/qmldir")));
        assert!(module.components.contains_key("Dial"));
        assert_eq!(ws.indexer.len(), 1);

        // the replaced manifest no longer owns the name
        ws.indexer.on_delete(&one).await.unwrap();
        assert!(ws.indexer.resolve_module("Shared.Kit", None).is_some());
        assert_eq!(ws.persisted(), (1, 1));
    }

    #[tokio::test]
    async fn test_delete_removes_module_everywhere() {
        let ws = Workspace::new(&[(
            "qml/Foo/Bar/qmldir",
            "module Foo.Bar\nsingleton Theme 1.0 Theme.qml\nButton 1.0 Button.qml\n",
        )]);
        let manifest = ws.path("qml/Foo/Bar/qmldir");
        ws.indexer.index_manifest(&manifest).await.unwrap();
        assert_eq!(ws.persisted(), (1, 2));

        std::fs::remove_file(&manifest).unwrap();
        ws.indexer.on_delete(&manifest).await.unwrap();

        assert!(ws.indexer.resolve_module("Foo.Bar", None).is_none());
        assert_eq!(ws.persisted(), (0, 0));
    }

    #[tokio::test]
    async fn test_scan_and_ambiguous_resolution() {
        let ws = Workspace::new(&[
            ("qml/B/Widgets/qmldir", "Knob 1.0 Knob.qml\n"),
            ("qml/A/Widgets/qmldir", "Knob 1.0 Knob.qml\n"),
            ("qml/Deep/Er/Widgets/qmldir", "Knob 1.0 Knob.qml\n"),
            ("qml/Nothing/qmldir", "# empty\n"),
            ("build/Gen/qmldir", "Gen 1.0 Gen.qml\n"),
        ]);

        let stats = ws.indexer.index_all().await.unwrap();
        assert_eq!(stats.manifests, 4);
        assert_eq!(stats.registered, 3);
        assert_eq!(stats.empty, 1);

        for _ in 0..5 {
            assert_eq!(ws.indexer.resolve_module("Widgets", None).unwrap().name, "A.Widgets");
        }

        let again = ws.indexer.index_all().await.unwrap();
        assert_eq!(again.skipped, 3);
    }

    #[tokio::test]
    async fn test_builtins_are_resolvable_but_not_persisted() {
        let ws = Workspace::new(&[]);
        let button = ws.indexer.resolve_component("QtQuick.Controls", "Button", None).unwrap();
        assert!(button.is_builtin);
        assert!(button.file_path.is_none());
        assert!(ws.indexer.resolve_component("Controls", "Button", Some("2.15")).is_some());
        assert!(ws.indexer.resolve_component("QtQuick.Controls", "Nope", None).is_none());
        assert!(ws.indexer.all_modules().iter().any(|m| m.name == "QtQuick"));
        assert_eq!(ws.persisted(), (0, 0));
    }

    #[tokio::test]
    async fn test_load_from_store_and_clear() {
        let ws = Workspace::new(&[("qml/Kit/qmldir", "Knob 1.0 Knob.qml\n")]);
        ws.indexer.index_all().await.unwrap();

        let reopened = ModuleIndexer::new(ws.dir.path(), ws.store.clone(), &IndexConfig::default()).unwrap();
        assert_eq!(reopened.load_from_store().unwrap(), 1);
        assert_eq!(reopened.resolve_module("Kit", None).unwrap().components.len(), 1);

        reopened.clear().unwrap();
        assert!(reopened.resolve_module("Kit", None).is_none());
        assert!(reopened.resolve_module("QtQuick", None).is_some());
        assert_eq!(ws.persisted(), (0, 0));
    }

    #[test]
    fn test_module_name_inference() {
        let root = Path::new("/w");
        assert_eq!(infer_module_name(root, Path::new("/w/qml/Foo/Bar"), &markers()), "Foo.Bar");
        assert_eq!(infer_module_name(root, Path::new("/w/src/imports/Acme"), &markers()), "Acme");
        assert_eq!(infer_module_name(root, Path::new("/w/modules/qml/X"), &markers()), "qml.X");
        assert_eq!(infer_module_name(root, Path::new("/w/qml"), &markers()), "qml");
        assert_eq!(infer_module_name(root, Path::new("/w/widgets/Dial"), &markers()), "Dial");
        assert_eq!(infer_module_name(root, Path::new("/elsewhere/Kit"), &markers()), "Kit");
    }
}
