//! File URI - Global, stable identity for every indexed document
//!
//! Format: `file://<absolute-path>`
//!
//! Examples:
//! - `file:///home/me/app/qml/Main.qml`
//! - `file:///home/me/app/qml/controls/qmldir`
//!
//! The path is always absolute and lexically normalized (`.` and `..` folded away),
//! so two references to the same file compare equal even if the file does not exist
//! yet. The persistent store keys rows by the bare path.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::UNIX_EPOCH;

const SCHEME: &str = "file://";

/// Absolute, normalized path identifying one document in the index.
///
/// This URI serves as the primary key for:
/// - Source file entries (memory and store)
/// - Dependency edges (`depends_on` / `depended_by`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileUri {
    path: PathBuf,
}

impl FileUri {
    /// Create a FileUri from any path, making it absolute against the current directory
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidUri("path must not be empty".to_string()));
        }
        let absolute = std::path::absolute(path)?;
        Ok(Self {
            path: normalize_path(&absolute),
        })
    }

    /// Parse a URI string into a FileUri
    ///
    /// Accepts `file://<absolute-path>` or a bare absolute path.
    pub fn parse(uri: &str) -> Result<Self> {
        let raw = uri.strip_prefix(SCHEME).unwrap_or(uri);
        if raw.is_empty() {
            return Err(Error::InvalidUri(format!("URI has no path: {}", uri)));
        }
        let path = Path::new(raw);
        if !path.is_absolute() {
            return Err(Error::InvalidUri(format!("URI path must be absolute: {}", uri)));
        }
        Ok(Self {
            path: normalize_path(path),
        })
    }

    /// Convert to URI string
    pub fn to_uri_string(&self) -> String {
        format!("{}{}", SCHEME, self.path.display())
    }

    /// The underlying absolute path
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// The path as a string, used as the storage key
    pub fn path_string(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Directory containing this file
    pub fn parent_dir(&self) -> Option<&Path> {
        self.path.parent()
    }

    /// Resolve a relative reference (e.g. `./B.qml`, `../lib/util.js`) against
    /// this file's directory. Absolute references are only normalized.
    pub fn resolve_relative(&self, reference: &str) -> FileUri {
        let reference = Path::new(reference);
        let joined = if reference.is_absolute() {
            reference.to_path_buf()
        } else {
            match self.parent_dir() {
                Some(dir) => dir.join(reference),
                None => reference.to_path_buf(),
            }
        };
        FileUri {
            path: normalize_path(&joined),
        }
    }
}

/// Fold `.` and `..` components without touching the file system.
///
/// `..` at the root is dropped, matching how the OS resolves `/..`.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

// ========== File stat helpers ==========

/// Modification time of a file in milliseconds since the Unix epoch
pub fn modified_millis(metadata: &Metadata) -> Result<i64> {
    let modified = metadata.modified()?;
    let millis = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    Ok(millis)
}

/// Stat a path and return its modification time, or `None` if it cannot be read
pub fn stat_millis(path: &Path) -> Option<i64> {
    std::fs::metadata(path)
        .ok()
        .and_then(|m| modified_millis(&m).ok())
}

impl fmt::Display for FileUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uri_string())
    }
}

impl FromStr for FileUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for FileUri {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.path_string())
    }
}

impl<'de> Deserialize<'de> for FileUri {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileUri::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_roundtrip() {
        let uri = FileUri::parse("/work/app/qml/Main.qml").unwrap();
        let uri_str = uri.to_uri_string();
        assert_eq!(uri_str, "file:///work/app/qml/Main.qml");

        let parsed = FileUri::parse(&uri_str).unwrap();
        assert_eq!(parsed, uri);
    }

    #[test]
    fn test_resolve_relative() {
        let a = FileUri::parse("/work/app/qml/A.qml").unwrap();
        assert_eq!(a.resolve_relative("./B.qml").as_path(), Path::new("/work/app/qml/B.qml"));
        assert_eq!(
            a.resolve_relative("../lib/./util.js").as_path(),
            Path::new("/work/app/lib/util.js")
        );
        assert_eq!(a.resolve_relative("/abs/C.qml").as_path(), Path::new("/abs/C.qml"));
    }

    #[test]
    fn test_normalize_never_escapes_root() {
        assert_eq!(normalize_path(Path::new("/a/../../b")), PathBuf::from("/b"));
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_invalid_uri() {
        assert!(FileUri::parse("").is_err());
        assert!(FileUri::parse("file://").is_err());
        assert!(FileUri::parse("relative/Main.qml").is_err());
    }

    #[test]
    fn test_from_path_is_absolute() {
        let uri = FileUri::from_path("some/dir/../Main.qml").unwrap();
        assert!(uri.as_path().is_absolute());
        assert!(uri.as_path().ends_with("some/Main.qml"));
    }
}
