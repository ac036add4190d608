//! Modules - `qmldir` manifests, the module registry and the builtin Qt catalog

pub mod manifest;
pub mod registry;
pub mod builtins;
pub mod indexer;

pub use manifest::{parse_manifest, Directive};
pub use registry::{ComponentRecord, ModuleRegistry, ModuleRegistryEntry};
pub use builtins::builtin_modules;
pub use indexer::{infer_module_name, ManifestScanStats, ModuleIndexer};
