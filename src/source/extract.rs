//! Metadata extraction from a syntax tree
//!
//! Turns a [`SyntaxTree`] into the three things the index stores per document:
//! classified imports, the export surface, and a flat symbol list.

use super::syntax::{ImportStatement, ImportTarget, Member, ObjectNode, SyntaxTree};
use crate::symbol::{Symbol, SymbolKind, TextRange};
use serde::{Deserialize, Serialize};

/// Extensions that make a quoted import a direct file reference
const SOURCE_FILE_EXTENSIONS: &[&str] = &["qml", "js", "mjs"];

/// What an import refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    /// Named module (`import QtQuick.Controls`)
    Module,
    /// Quoted directory or URL (`import "../components"`)
    Directory,
    /// Quoted source file (`import "./B.qml"`, `import "util.js" as Util`)
    File,
}

impl ImportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportKind::Module => "module",
            ImportKind::Directory => "directory",
            ImportKind::File => "file",
        }
    }

    /// Classify an import target
    pub fn classify(target: &ImportTarget) -> Self {
        match target {
            ImportTarget::Module(_) => ImportKind::Module,
            ImportTarget::Path(path) => {
                if has_url_scheme(path) {
                    return ImportKind::Directory;
                }
                let is_source_file = path
                    .rsplit_once('.')
                    .map(|(_, ext)| ext.to_ascii_lowercase())
                    .is_some_and(|ext| SOURCE_FILE_EXTENSIONS.contains(&ext.as_str()));
                if is_source_file {
                    ImportKind::File
                } else {
                    ImportKind::Directory
                }
            }
        }
    }
}

/// `qrc:/x.qml`, `http://...`; a single letter before ':' is a Windows drive
fn has_url_scheme(path: &str) -> bool {
    match path.split_once(':') {
        Some((scheme, _)) => {
            scheme.len() > 1 && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-')
        }
        None => false,
    }
}

/// One import statement of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    pub kind: ImportKind,
    /// Raw reference as written (module URI or unquoted path)
    pub source: String,
    pub version: Option<String>,
    pub alias: Option<String>,
    pub range: TextRange,
}

impl Import {
    fn from_statement(statement: &ImportStatement) -> Self {
        Self {
            kind: ImportKind::classify(&statement.target),
            source: statement.target.as_str().to_string(),
            version: statement.version.clone(),
            alias: statement.alias.clone(),
            range: statement.range,
        }
    }
}

/// What a document makes available to its importers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exports {
    /// Type of the root object; the document's component is-a this type
    pub root_component_type: Option<String>,
    /// `component Name: ...` declarations
    pub inline_component_names: Vec<String>,
    /// Document carries `pragma Singleton`
    pub is_singleton: bool,
}

/// Everything extracted from one parsed document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub imports: Vec<Import>,
    pub exports: Exports,
    pub symbols: Vec<Symbol>,
}

/// Extract imports, exports and symbols from a tree
pub fn extract(tree: &SyntaxTree) -> Extracted {
    let imports = tree.imports.iter().map(Import::from_statement).collect();

    let mut exports = Exports {
        root_component_type: Some(tree.root.type_name.clone()),
        inline_component_names: Vec::new(),
        is_singleton: tree.has_pragma("Singleton"),
    };

    let mut symbols = Vec::new();
    collect_object(&tree.root, &mut symbols, &mut exports.inline_component_names);

    Extracted {
        imports,
        exports,
        symbols,
    }
}

fn collect_object(object: &ObjectNode, symbols: &mut Vec<Symbol>, inline_components: &mut Vec<String>) {
    symbols.push(Symbol::new(
        object.type_name.clone(),
        object.type_name.clone(),
        SymbolKind::Object,
        object.range,
    ));

    for member in &object.members {
        match member {
            Member::Id { name, range } => {
                symbols.push(Symbol::new(name.clone(), object.type_name.clone(), SymbolKind::Id, *range));
            }
            Member::Property {
                name,
                type_name,
                range,
                objects,
            } => {
                symbols.push(Symbol::new(name.clone(), type_name.clone(), SymbolKind::Property, *range));
                for nested in objects {
                    collect_object(nested, symbols, inline_components);
                }
            }
            Member::Signal { name, range } => {
                symbols.push(Symbol::new(name.clone(), "signal", SymbolKind::Signal, *range));
            }
            Member::Function { name, range } => {
                symbols.push(Symbol::new(name.clone(), "function", SymbolKind::Function, *range));
            }
            Member::InlineComponent { name, object, .. } => {
                inline_components.push(name.clone());
                collect_object(object, symbols, inline_components);
            }
            Member::Binding { objects, .. } => {
                for nested in objects {
                    collect_object(nested, symbols, inline_components);
                }
            }
            Member::Object(nested) => collect_object(nested, symbols, inline_components),
            Member::Enum { .. } => {}
        }
    }
}
