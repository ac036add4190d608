//! Module registry - module name → component table with suffix resolution

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use crate::uri::FileUri;

/// `MAJOR` or `MAJOR.MINOR`
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(?:\.(\d+))?$").unwrap());

/// Version assigned to a module whose components carry none
pub const DEFAULT_MODULE_VERSION: &str = "1.0";

/// One reusable type exported by a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub name: String,
    /// Backing document; absent for builtins
    pub file_path: Option<FileUri>,
    pub is_builtin: bool,
    pub is_singleton: bool,
    pub version: Option<String>,
}

impl ComponentRecord {
    /// Whether a request for `requested` can see this component
    pub fn is_visible_at(&self, requested: Option<&str>) -> bool {
        match (self.version.as_deref(), requested) {
            (Some(declared), Some(requested)) => version_satisfies(declared, requested),
            _ => true,
        }
    }
}

/// A named module with its components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRegistryEntry {
    pub name: String,
    pub version: String,
    /// Manifest the module was read from; absent for builtins
    pub manifest_path: Option<FileUri>,
    /// Manifest modification time in milliseconds; absent for builtins
    pub last_modified: Option<i64>,
    pub components: BTreeMap<String, ComponentRecord>,
}

impl ModuleRegistryEntry {
    pub fn is_builtin(&self) -> bool {
        self.manifest_path.is_none()
    }

    /// Look up a component, honoring the requested version
    pub fn component(&self, name: &str, version: Option<&str>) -> Option<&ComponentRecord> {
        self.components
            .get(name)
            .filter(|component| component.is_visible_at(version))
    }
}

/// Modules keyed by fully qualified name
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, ModuleRegistryEntry>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: ModuleRegistryEntry) -> Option<ModuleRegistryEntry> {
        self.modules.insert(module.name.clone(), module)
    }

    pub fn remove(&mut self, name: &str) -> Option<ModuleRegistryEntry> {
        self.modules.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&ModuleRegistryEntry> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn clear(&mut self) {
        self.modules.clear();
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleRegistryEntry> {
        self.modules.values()
    }

    /// The module read from `manifest`, if any
    pub fn find_by_manifest(&self, manifest: &FileUri) -> Option<&ModuleRegistryEntry> {
        self.modules
            .values()
            .find(|module| module.manifest_path.as_ref() == Some(manifest))
    }

    /// Exact name first, then the best suffix match.
    ///
    /// A suffix match compares the trailing segments of each known name, taking as
    /// many segments as `name` has. Several candidates resolve to the shortest full
    /// name: fewest segments, then fewest characters, then lexicographic order.
    pub fn resolve(&self, name: &str) -> Option<&ModuleRegistryEntry> {
        if name.is_empty() {
            return None;
        }
        if let Some(module) = self.modules.get(name) {
            return Some(module);
        }

        let wanted: Vec<&str> = name.split('.').collect();
        self.modules
            .values()
            .filter(|module| has_segment_suffix(&module.name, &wanted))
            .min_by(|a, b| shortest_name_first(&a.name, &b.name))
    }
}

fn has_segment_suffix(full_name: &str, wanted: &[&str]) -> bool {
    let segments: Vec<&str> = full_name.split('.').collect();
    segments.len() >= wanted.len() && segments[segments.len() - wanted.len()..] == *wanted
}

fn shortest_name_first(a: &str, b: &str) -> Ordering {
    let segments = |name: &str| name.split('.').count();
    segments(a)
        .cmp(&segments(b))
        .then_with(|| a.len().cmp(&b.len()))
        .then_with(|| a.cmp(b))
}

/// Parse `MAJOR[.MINOR]`; a missing minor is 0
pub fn parse_version(version: &str) -> Option<(u32, u32)> {
    let caps = VERSION_RE.captures(version.trim())?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = match caps.get(2) {
        Some(minor) => minor.as_str().parse().ok()?,
        None => 0,
    };
    Some((major, minor))
}

/// Same major, declared minor not above requested minor.
///
/// Unparseable versions on either side are compatible.
pub fn version_satisfies(declared: &str, requested: &str) -> bool {
    match (parse_version(declared), parse_version(requested)) {
        (Some((declared_major, declared_minor)), Some((requested_major, requested_minor))) => {
            declared_major == requested_major && declared_minor <= requested_minor
        }
        _ => true,
    }
}

/// Order optional versions: unparseable and absent sort lowest
pub fn compare_versions(a: Option<&str>, b: Option<&str>) -> Ordering {
    let key = |v: Option<&str>| v.and_then(parse_version);
    key(a).cmp(&key(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str, components: &[&str]) -> ModuleRegistryEntry {
        ModuleRegistryEntry {
            name: name.to_string(),
            version: "1.0".to_string(),
            manifest_path: Some(FileUri::parse(&format!("/w/{}/qmldir", name.replace('.', "/"))).unwrap()),
            last_modified: Some(1),
            components: components
                .iter()
                .map(|c| {
                    (
                        c.to_string(),
                        ComponentRecord {
                            name: c.to_string(),
                            file_path: None,
                            is_builtin: false,
                            is_singleton: false,
                            version: Some("1.2".to_string()),
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_suffix_resolution() {
        let mut registry = ModuleRegistry::new();
        registry.insert(module("Foo.Bar.Baz", &["Dial"]));

        assert_eq!(registry.resolve("Baz").unwrap().name, "Foo.Bar.Baz");
        assert_eq!(registry.resolve("Bar.Baz").unwrap().name, "Foo.Bar.Baz");
        assert_eq!(registry.resolve("Foo.Bar.Baz").unwrap().name, "Foo.Bar.Baz");
        assert!(registry.resolve("az").is_none());
        assert!(registry.resolve("Bar").is_none());
        assert!(registry.resolve("").is_none());
    }

    #[test]
    fn test_ambiguous_suffix_prefers_shortest_name() {
        let mut registry = ModuleRegistry::new();
        registry.insert(module("B.Widgets", &["Knob"]));
        registry.insert(module("Deep.Nested.Widgets", &["Knob"]));
        registry.insert(module("A.Widgets", &["Knob"]));
        registry.insert(module("Longer.Widgets", &["Knob"]));

        for _ in 0..10 {
            assert_eq!(registry.resolve("Widgets").unwrap().name, "A.Widgets");
        }
    }

    #[test]
    fn test_exact_match_beats_suffix() {
        let mut registry = ModuleRegistry::new();
        registry.insert(module("Org.Widgets", &["Knob"]));
        registry.insert(module("Widgets", &["Knob"]));
        assert_eq!(registry.resolve("Widgets").unwrap().name, "Widgets");
    }

    #[test]
    fn test_version_rules() {
        assert!(version_satisfies("2.1", "2.15"));
        assert!(version_satisfies("2.15", "2.15"));
        assert!(!version_satisfies("2.16", "2.15"));
        assert!(!version_satisfies("1.0", "2.0"));
        assert!(version_satisfies("2", "2.0"));
        assert!(version_satisfies("auto", "2.0"));
        assert!(version_satisfies("2.0", "latest"));
        assert_eq!(parse_version("6.5"), Some((6, 5)));
        assert_eq!(parse_version("6.x"), None);
    }

    #[test]
    fn test_component_visibility() {
        let module = module("Foo.Bar", &["Dial"]);
        assert!(module.component("Dial", None).is_some());
        assert!(module.component("Dial", Some("1.5")).is_some());
        assert!(module.component("Dial", Some("1.1")).is_none());
        assert!(module.component("Dial", Some("2.5")).is_none());
        assert!(module.component("Missing", None).is_none());
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions(Some("1.10"), Some("1.9")), Ordering::Greater);
        assert_eq!(compare_versions(None, Some("0.1")), Ordering::Less);
        assert_eq!(compare_versions(Some("2.0"), Some("2")), Ordering::Equal);
    }
}
