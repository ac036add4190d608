//! File Graph - in-memory source file entries with their dependency edges
//!
//! Owns the live `SourceFileEntry` map and keeps `depended_by` the exact
//! transpose of every live entry's `depends_on`:
//! - `insert` replaces an entry and patches reverse edges incrementally
//! - `remove` drops an entry and the reverse edges it contributed
//! - `rebuild_reverse_edges` recomputes every reverse edge from scratch
//! - `invalidate` removes an entry plus everything that transitively depends on it
//!
//! A `depends_on` target without a live entry is allowed: removal is lazy, so a
//! dependency can be missing until the next scan re-indexes it.

use std::collections::{BTreeSet, HashMap, HashSet};
use crate::source::SourceFileEntry;
use crate::uri::FileUri;

/// Live source entries keyed by URI.
#[derive(Debug, Default)]
pub struct FileGraph {
    entries: HashMap<FileUri, SourceFileEntry>,
    /// target → live sources whose `depends_on` lists it; the target need not be live
    dependents: HashMap<FileUri, BTreeSet<FileUri>>,
}

impl FileGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an entry by its URI
    pub fn get(&self, uri: &FileUri) -> Option<&SourceFileEntry> {
        self.entries.get(uri)
    }

    pub fn contains(&self, uri: &FileUri) -> bool {
        self.entries.contains_key(uri)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, in no particular order
    pub fn entries(&self) -> impl Iterator<Item = &SourceFileEntry> {
        self.entries.values()
    }

    /// Insert or replace an entry, keeping reverse edges consistent.
    ///
    /// The stored entry's `depended_by` is recomputed from the live graph; whatever
    /// the caller put there is ignored. Returns the stored entry.
    pub fn insert(&mut self, mut entry: SourceFileEntry) -> &SourceFileEntry {
        let uri = entry.uri.clone();
        if let Some(previous) = self.entries.remove(&uri) {
            self.unlink(&uri, &previous.depends_on);
        }

        self.link(&uri, &entry.depends_on);
        entry.depended_by = self.dependents_of(&uri);
        self.entries.entry(uri).or_insert(entry)
    }

    /// Replace the whole graph with `entries` and recompute every reverse edge
    pub fn load(&mut self, entries: impl IntoIterator<Item = SourceFileEntry>) {
        self.entries = entries
            .into_iter()
            .map(|entry| (entry.uri.clone(), entry))
            .collect();
        self.rebuild_reverse_edges();
    }

    /// Remove a single entry without cascading
    pub fn remove(&mut self, uri: &FileUri) -> Option<SourceFileEntry> {
        let removed = self.entries.remove(uri)?;
        self.unlink(uri, &removed.depends_on);
        Some(removed)
    }

    /// Remove `uri` and, transitively, every entry that depended on it.
    ///
    /// Uses an explicit worklist with a visited set, so cycles terminate and each
    /// entry is removed at most once. Returns the removed URIs in removal order.
    pub fn invalidate(&mut self, uri: &FileUri) -> Vec<FileUri> {
        let mut visited = HashSet::new();
        let mut worklist = vec![uri.clone()];
        let mut removed = Vec::new();

        while let Some(current) = worklist.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }

            if let Some(entry) = self.remove(&current) {
                for dependent in entry.depended_by {
                    if !visited.contains(&dependent) {
                        worklist.push(dependent);
                    }
                }
                removed.push(current);
            }
        }

        removed
    }

    /// Recompute every `depended_by` list from the live `depends_on` lists
    pub fn rebuild_reverse_edges(&mut self) {
        let mut dependents: HashMap<FileUri, BTreeSet<FileUri>> = HashMap::new();
        for entry in self.entries.values() {
            for target in &entry.depends_on {
                dependents
                    .entry(target.clone())
                    .or_default()
                    .insert(entry.uri.clone());
            }
        }
        self.dependents = dependents;

        let uris: Vec<FileUri> = self.entries.keys().cloned().collect();
        for uri in uris {
            let depended_by = self.dependents_of(&uri);
            if let Some(entry) = self.entries.get_mut(&uri) {
                entry.depended_by = depended_by;
            }
        }
    }

    /// Whether every `depended_by` is exactly the transpose of live `depends_on`
    pub fn reverse_edges_consistent(&self) -> bool {
        let mut expected: HashMap<&FileUri, Vec<&FileUri>> = HashMap::new();
        for entry in self.entries.values() {
            for target in &entry.depends_on {
                if self.entries.contains_key(target) {
                    expected.entry(target).or_default().push(&entry.uri);
                }
            }
        }

        self.entries.values().all(|entry| {
            let mut want = expected.remove(&entry.uri).unwrap_or_default();
            want.sort();
            want.dedup();
            let have: Vec<&FileUri> = entry.depended_by.iter().collect();
            have == want
        })
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        self.entries.clear();
        self.dependents.clear();
    }

    fn dependents_of(&self, uri: &FileUri) -> Vec<FileUri> {
        self.dependents
            .get(uri)
            .map(|sources| sources.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn link(&mut self, source: &FileUri, targets: &[FileUri]) {
        for target in targets {
            self.dependents
                .entry(target.clone())
                .or_default()
                .insert(source.clone());
            if let Some(dependency) = self.entries.get_mut(target) {
                insert_sorted(&mut dependency.depended_by, source.clone());
            }
        }
    }

    fn unlink(&mut self, source: &FileUri, targets: &[FileUri]) {
        for target in targets {
            if let Some(sources) = self.dependents.get_mut(target) {
                sources.remove(source);
                if sources.is_empty() {
                    self.dependents.remove(target);
                }
            }
            if let Some(dependency) = self.entries.get_mut(target) {
                dependency.depended_by.retain(|uri| uri != source);
            }
        }
    }
}

fn insert_sorted(list: &mut Vec<FileUri>, uri: FileUri) {
    if let Err(position) = list.binary_search(&uri) {
        list.insert(position, uri);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Exports;

    fn uri(name: &str) -> FileUri {
        FileUri::parse(&format!("/w/{}.qml", name)).unwrap()
    }

    fn entry(name: &str, deps: &[&str]) -> SourceFileEntry {
        SourceFileEntry {
            uri: uri(name),
            content_hash: format!("hash-{}", name),
            last_modified: 1,
            imports: Vec::new(),
            exports: Exports::default(),
            symbols: Vec::new(),
            depends_on: deps.iter().map(|d| uri(d)).collect(),
            depended_by: Vec::new(),
        }
    }

    #[test]
    fn test_insert_maintains_transpose() {
        let mut graph = FileGraph::new();
        graph.insert(entry("A", &["B"]));
        graph.insert(entry("B", &[]));
        graph.insert(entry("C", &["B", "A"]));

        assert_eq!(graph.get(&uri("B")).unwrap().depended_by, vec![uri("A"), uri("C")]);
        assert_eq!(graph.get(&uri("A")).unwrap().depended_by, vec![uri("C")]);
        assert!(graph.reverse_edges_consistent());

        // Replacing C without its imports drops the edges it contributed
        graph.insert(entry("C", &[]));
        assert_eq!(graph.get(&uri("B")).unwrap().depended_by, vec![uri("A")]);
        assert!(graph.get(&uri("A")).unwrap().depended_by.is_empty());
        assert!(graph.reverse_edges_consistent());
    }

    #[test]
    fn test_remove_drops_edges_from_missing_sources() {
        let mut graph = FileGraph::new();
        graph.insert(entry("A", &["B"]));
        graph.insert(entry("B", &[]));

        graph.remove(&uri("A"));
        assert!(graph.get(&uri("B")).unwrap().depended_by.is_empty());
        assert!(graph.reverse_edges_consistent());
    }

    #[test]
    fn test_missing_dependency_is_allowed() {
        let mut graph = FileGraph::new();
        graph.insert(entry("A", &["B"]));
        graph.insert(entry("B", &[]));
        graph.remove(&uri("B"));

        assert_eq!(graph.get(&uri("A")).unwrap().depends_on, vec![uri("B")]);
        assert!(graph.reverse_edges_consistent());
    }

    #[test]
    fn test_rebuild_matches_incremental() {
        let mut graph = FileGraph::new();
        graph.insert(entry("A", &["B", "C"]));
        graph.insert(entry("B", &["C"]));
        graph.insert(entry("C", &[]));
        let incremental: Vec<_> = ["A", "B", "C"]
            .iter()
            .map(|n| graph.get(&uri(n)).unwrap().depended_by.clone())
            .collect();

        graph.rebuild_reverse_edges();
        let rebuilt: Vec<_> = ["A", "B", "C"]
            .iter()
            .map(|n| graph.get(&uri(n)).unwrap().depended_by.clone())
            .collect();

        assert_eq!(incremental, rebuilt);
        assert_eq!(rebuilt[2], vec![uri("A"), uri("B")]);
    }

    #[test]
    fn test_dependency_created_later_sees_its_dependents() {
        let mut graph = FileGraph::new();
        graph.insert(entry("A", &["B"]));
        graph.insert(entry("C", &["B"]));
        let b = graph.insert(entry("B", &[]));
        assert_eq!(b.depended_by, vec![uri("A"), uri("C")]);
    }

    #[test]
    fn test_load_recomputes_reverse_edges() {
        let mut stale = entry("B", &[]);
        stale.depended_by = vec![uri("Gone")];

        let mut graph = FileGraph::new();
        graph.load(vec![entry("A", &["B"]), stale]);
        assert_eq!(graph.get(&uri("B")).unwrap().depended_by, vec![uri("A")]);
        assert!(graph.reverse_edges_consistent());
    }

    #[test]
    fn test_invalidate_cascades_transitively() {
        // D -> C -> B, A -> B, E unrelated
        let mut graph = FileGraph::new();
        graph.insert(entry("B", &[]));
        graph.insert(entry("C", &["B"]));
        graph.insert(entry("D", &["C"]));
        graph.insert(entry("A", &["B"]));
        graph.insert(entry("E", &[]));

        let mut removed = graph.invalidate(&uri("B"));
        removed.sort();
        assert_eq!(removed, vec![uri("A"), uri("B"), uri("C"), uri("D")]);
        assert_eq!(graph.len(), 1);
        assert!(graph.contains(&uri("E")));
        assert!(graph.reverse_edges_consistent());
    }

    #[test]
    fn test_invalidate_terminates_on_cycles() {
        // A -> B -> C -> A, plus D -> A
        let mut graph = FileGraph::new();
        graph.insert(entry("A", &["B"]));
        graph.insert(entry("B", &["C"]));
        graph.insert(entry("C", &["A"]));
        graph.insert(entry("D", &["A"]));

        let removed = graph.invalidate(&uri("B"));
        let unique: HashSet<_> = removed.iter().collect();
        assert_eq!(removed.len(), 4);
        assert_eq!(unique.len(), 4);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_invalidate_unknown_uri_is_noop() {
        let mut graph = FileGraph::new();
        graph.insert(entry("A", &[]));
        assert!(graph.invalidate(&uri("Z")).is_empty());
        assert_eq!(graph.len(), 1);
    }
}
