use glob::{MatchOptions, Pattern};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;
use crate::Result;

/// Directories and files never worth indexing in a QML workspace
const DEFAULT_EXCLUDES: &[&str] = &[
    // Build output and tool state
    "build/", "build-*/", "out/", "dist/", "target/", "node_modules/",
    ".git/", ".qmlscope/", ".qt/", ".rcc/", ".vscode/", ".idea/",
    "CMakeFiles/", "*_autogen/",

    // Database files
    "*.db", "*.sqlite", "*.sqlite3", "*.db-wal", "*.db-shm",
];

/// Gitignore-style path exclusion shared by the workspace walk and the watchers.
///
/// Combines the built-in noise list, the workspace's `.gitignore` and `.ignore`,
/// and the configured extra globs.
#[derive(Debug, Clone)]
pub struct ExcludeFilter {
    root: PathBuf,
    inner: Gitignore,
}

impl ExcludeFilter {
    pub fn new(root: &Path, extra_excludes: &[String]) -> Self {
        let mut builder = GitignoreBuilder::new(root);

        // 1. Load from .gitignore and .ignore
        for file in [".gitignore", ".ignore"] {
            let path = root.join(file);
            if path.is_file() {
                if let Some(e) = builder.add(&path) {
                    debug!(path = %path.display(), "partially invalid ignore file: {}", e);
                }
            }
        }

        // 2. Built-in defaults
        for pattern in DEFAULT_EXCLUDES {
            builder.add_line(None, pattern).ok();
        }

        // 3. Configured excludes
        for pattern in extra_excludes {
            if let Err(e) = builder.add_line(None, pattern) {
                debug!(pattern = %pattern, "skipping invalid exclude pattern: {}", e);
            }
        }

        Self {
            root: root.to_path_buf(),
            inner: builder.build().unwrap_or_else(|_| Gitignore::empty()),
        }
    }

    /// Whether `path` or any of its parent directories is excluded.
    ///
    /// Paths outside the workspace root are never excluded.
    pub fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        if relative.as_os_str().is_empty() {
            return false;
        }
        self.inner
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }
}

/// Glob selection plus exclusion, relative to a workspace root.
///
/// Used both to enumerate files for a full scan and to filter watcher events, so
/// the two always agree on which files belong to the index.
#[derive(Debug, Clone)]
pub struct FileMatcher {
    root: PathBuf,
    pattern: Pattern,
    exclude: Option<ExcludeFilter>,
}

impl FileMatcher {
    pub fn new(root: &Path, pattern: &str, exclude: Option<ExcludeFilter>) -> Result<Self> {
        Ok(Self {
            root: root.to_path_buf(),
            pattern: Pattern::new(pattern)?,
            exclude,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` (absolute) matches the glob relative to the root and is not excluded
    pub fn accepts(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::new()
        };
        if !self.pattern.matches_path_with(relative, options) {
            return false;
        }
        match &self.exclude {
            Some(exclude) => !exclude.is_excluded(path, false),
            None => true,
        }
    }

    /// Every accepted file under the root, sorted. Excluded directories are pruned.
    pub fn walk(&self) -> Vec<PathBuf> {
        let exclude = self.exclude.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(false)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .require_git(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                match &exclude {
                    Some(exclude) => !exclude.is_excluded(entry.path(), is_dir),
                    None => true,
                }
            });

        let mut files: Vec<PathBuf> = builder
            .build()
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let is_file = entry.file_type().is_some_and(|t| t.is_file());
                (is_file && self.accepts(entry.path())).then(|| entry.into_path())
            })
            .collect();
        files.sort();
        files
    }
}
