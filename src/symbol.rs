//! Symbol types - what a QML document declares
//!
//! Every declaration found in a document maps onto one of five kinds:
//! - `Property`: `property int count`
//! - `Signal`: `signal clicked()`
//! - `Function`: `function reset() { ... }`
//! - `Id`: `id: root`
//! - `Object`: an object instantiation such as `Rectangle { ... }`

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Symbol kinds recorded for each indexed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    /// Declared property (`property T name`)
    Property,
    /// Declared signal
    Signal,
    /// JavaScript function member
    Function,
    /// Object id binding
    Id,
    /// Object instantiation
    Object,
}

impl SymbolKind {
    /// Get the string representation of the symbol kind
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Property => "property",
            SymbolKind::Signal => "signal",
            SymbolKind::Function => "function",
            SymbolKind::Id => "id",
            SymbolKind::Object => "object",
        }
    }

    /// Get all symbol kinds
    pub fn all() -> &'static [SymbolKind] {
        &[
            SymbolKind::Property,
            SymbolKind::Signal,
            SymbolKind::Function,
            SymbolKind::Id,
            SymbolKind::Object,
        ]
    }
}

impl FromStr for SymbolKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "property" | "prop" => Ok(SymbolKind::Property),
            "signal" => Ok(SymbolKind::Signal),
            "function" | "fn" | "method" => Ok(SymbolKind::Function),
            "id" => Ok(SymbolKind::Id),
            "object" | "obj" | "component" => Ok(SymbolKind::Object),
            _ => Err(Error::Parse(format!("Unknown symbol kind: {}", s))),
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Zero-based line/character position in a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Half-open source range `[start, end)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Smallest range covering both `self` and `other`
    pub fn cover(self, other: TextRange) -> TextRange {
        TextRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A named declaration inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Symbol name (property name, id value, object type name, ...)
    pub name: String,
    /// Declared type (`int`, `Rectangle`, `signal`, `function`, ...)
    pub declared_type: String,
    /// The kind of declaration
    pub kind: SymbolKind,
    /// Where the declaration appears
    pub range: TextRange,
}

impl Symbol {
    /// Create a new symbol
    pub fn new(
        name: impl Into<String>,
        declared_type: impl Into<String>,
        kind: SymbolKind,
        range: TextRange,
    ) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            kind,
            range,
        }
    }

    /// Get a short description for display
    pub fn short_description(&self) -> String {
        format!("{} {}: {}", self.kind, self.name, self.declared_type)
    }
}
