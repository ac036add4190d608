//! Syntax tree produced by a [`DocumentParser`](super::DocumentParser)
//!
//! Only the declarative surface of a QML document is modelled. JavaScript bodies
//! and binding expressions are opaque to the index and are not kept.

use crate::symbol::TextRange;

/// A parsed QML document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntaxTree {
    /// `pragma Singleton`, `pragma ComponentBehavior: Bound`, ...
    pub pragmas: Vec<Pragma>,
    /// Import statements in declaration order
    pub imports: Vec<ImportStatement>,
    /// The root object definition
    pub root: ObjectNode,
}

impl SyntaxTree {
    /// Whether a pragma with this name is present
    pub fn has_pragma(&self, name: &str) -> bool {
        self.pragmas.iter().any(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pragma {
    pub name: String,
    pub value: Option<String>,
    pub range: TextRange,
}

/// What an import statement points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget {
    /// Dotted module URI, e.g. `QtQuick.Controls`
    Module(String),
    /// Quoted path or URL, e.g. `"./B.qml"` or `"../components"`
    Path(String),
}

impl ImportTarget {
    /// The raw reference as written, without quotes
    pub fn as_str(&self) -> &str {
        match self {
            ImportTarget::Module(name) => name,
            ImportTarget::Path(path) => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    pub target: ImportTarget,
    pub version: Option<String>,
    pub alias: Option<String>,
    pub range: TextRange,
}

/// An object definition: `Type { members }`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectNode {
    /// Possibly qualified type name (`Rectangle`, `Controls.Button`)
    pub type_name: String,
    pub range: TextRange,
    pub members: Vec<Member>,
}

impl ObjectNode {
    /// The value of this object's `id:` binding, if any
    pub fn id(&self) -> Option<&str> {
        self.members.iter().find_map(|m| match m {
            Member::Id { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }
}

/// A member inside an object body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    /// `id: name`
    Id { name: String, range: TextRange },
    /// `[default|readonly|required] property <type> <name> [: value]`
    Property {
        name: String,
        type_name: String,
        range: TextRange,
        /// Object definitions appearing in the initializer
        objects: Vec<ObjectNode>,
    },
    /// `signal name(...)`
    Signal { name: String, range: TextRange },
    /// `function name(...) { ... }`
    Function { name: String, range: TextRange },
    /// `component Name: Base { ... }`
    InlineComponent {
        name: String,
        range: TextRange,
        object: ObjectNode,
    },
    /// `enum Name { ... }`
    Enum { name: String, range: TextRange },
    /// `name: value` or `name: [ ... ]`, keeping any object definitions in the value
    Binding {
        name: String,
        range: TextRange,
        objects: Vec<ObjectNode>,
    },
    /// Nested object definition, including `Behavior on x { ... }`
    Object(ObjectNode),
}
