//! Source documents - parsing, metadata extraction and the per-file index
//!
//! - `lexer` / `parser`: default [`DocumentParser`] for QML text
//! - `syntax`: the tree a parser produces
//! - `extract`: imports, exports and symbols from a tree
//! - `entry`: the indexed record for one document
//! - `indexer`: the live index, workspace scan and watch handling

pub mod syntax;
pub mod lexer;
pub mod parser;
pub mod extract;
pub mod entry;
pub mod indexer;

pub use syntax::SyntaxTree;
pub use parser::{DocumentParser, QmlParser};
pub use extract::{Import, ImportKind, Exports};
pub use entry::{SourceFileEntry, content_digest};
pub use indexer::{SourceFileIndexer, ScanStats, ScanFailure};
