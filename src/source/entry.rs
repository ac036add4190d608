//! Source file entries - the per-document record held in memory and in the store

use super::extract::{extract, Exports, Import, ImportKind};
use super::syntax::SyntaxTree;
use crate::symbol::Symbol;
use crate::uri::FileUri;
use serde::{Deserialize, Serialize};

/// Everything the index knows about one document.
///
/// `depends_on` and `depended_by` are kept sorted and deduplicated so that
/// indexing the same bytes twice yields equal entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFileEntry {
    pub uri: FileUri,
    /// BLAKE3 digest of the file bytes (hex)
    pub content_hash: String,
    /// Modification time in milliseconds since the Unix epoch
    pub last_modified: i64,
    pub imports: Vec<Import>,
    pub exports: Exports,
    pub symbols: Vec<Symbol>,
    /// Files this document imports directly (`file`-kind imports only)
    pub depends_on: Vec<FileUri>,
    /// Live entries whose `depends_on` contains this document
    pub depended_by: Vec<FileUri>,
}

impl SourceFileEntry {
    /// Build an entry from a freshly parsed tree. `depended_by` starts empty and
    /// is filled in by the dependency graph.
    pub fn from_syntax(uri: FileUri, content_hash: String, last_modified: i64, tree: &SyntaxTree) -> Self {
        let extracted = extract(tree);
        let depends_on = file_dependencies(&uri, &extracted.imports);
        Self {
            uri,
            content_hash,
            last_modified,
            imports: extracted.imports,
            exports: extracted.exports,
            symbols: extracted.symbols,
            depends_on,
            depended_by: Vec::new(),
        }
    }

    /// Whether this entry was built from exactly these bytes at this timestamp
    pub fn is_current(&self, content_hash: &str, last_modified: i64) -> bool {
        self.content_hash == content_hash && self.last_modified == last_modified
    }
}

/// Resolve `file`-kind imports against the importing document's directory
pub fn file_dependencies(uri: &FileUri, imports: &[Import]) -> Vec<FileUri> {
    let mut targets: Vec<FileUri> = imports
        .iter()
        .filter(|import| import.kind == ImportKind::File)
        .map(|import| uri.resolve_relative(&import.source))
        .filter(|target| target != uri)
        .collect();
    targets.sort();
    targets.dedup();
    targets
}

/// Compute the BLAKE3 content digest of file bytes
pub fn content_digest(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{DocumentParser, QmlParser};

    #[test]
    fn test_dependencies_are_resolved_and_deduplicated() {
        let uri = FileUri::parse("/w/qml/A.qml").unwrap();
        let tree = QmlParser::new()
            .parse(
                "import QtQuick\nimport \"./B.qml\"\nimport \"B.qml\" as Again\nimport \"../js/util.js\" as U\nimport \"./widgets\"\nItem {}\n",
            )
            .unwrap();
        let entry = SourceFileEntry::from_syntax(uri, "h".into(), 1, &tree);

        let deps: Vec<String> = entry.depends_on.iter().map(FileUri::path_string).collect();
        assert_eq!(deps, vec!["/w/js/util.js".to_string(), "/w/qml/B.qml".to_string()]);
        assert!(entry.depended_by.is_empty());
    }

    #[test]
    fn test_self_import_is_not_a_dependency() {
        let uri = FileUri::parse("/w/A.qml").unwrap();
        let tree = QmlParser::new().parse("import \"./A.qml\"\nItem {}\n").unwrap();
        let entry = SourceFileEntry::from_syntax(uri, "h".into(), 1, &tree);
        assert!(entry.depends_on.is_empty());
    }

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(content_digest(b"Item {}"), content_digest(b"Item {}"));
        assert_ne!(content_digest(b"Item {}"), content_digest(b"Item { }"));
        assert_eq!(content_digest(b"").len(), 64);
    }
}
