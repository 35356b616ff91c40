//! Source file discovery

use crate::config::IndexerConfig;
use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Walks the repository respecting .gitignore, ignored directories and globs
pub struct Walker {
    root: PathBuf,
    extensions: HashSet<String>,
    ignore_dirs: Vec<String>,
    ignore_globs: GlobSet,
}

impl Walker {
    pub fn new(root: impl Into<PathBuf>, config: &IndexerConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.ignore_globs {
            let glob = Glob::new(pattern).with_context(|| format!("Invalid ignore glob: {pattern}"))?;
            builder.add(glob);
        }

        Ok(Self {
            root: root.into(),
            extensions: config.extensions.iter().cloned().collect(),
            ignore_dirs: config.ignore_dirs.clone(),
            ignore_globs: builder.build().context("Failed to build ignore globs")?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` would be indexed: right extension, not under an ignored
    /// directory, not matched by an ignore glob.
    pub fn accepts(&self, path: &Path) -> bool {
        let has_extension = path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| self.extensions.contains(ext));
        if !has_extension {
            return false;
        }

        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let in_ignored_dir = relative.components().any(|c| match c {
            Component::Normal(name) => self.ignore_dirs.iter().any(|d| OsStr::new(d) == name),
            _ => false,
        });

        !in_ignored_dir && !self.ignore_globs.is_match(relative)
    }

    /// Walk the directory tree and return an iterator of file paths
    pub fn walk(&self) -> impl Iterator<Item = PathBuf> + '_ {
        let mut builder = WalkBuilder::new(&self.root);
        builder.git_ignore(true);
        builder.git_exclude(true);
        builder.require_git(false);
        builder.hidden(true);

        let mut overrides = OverrideBuilder::new(&self.root);
        for dir in &self.ignore_dirs {
            if let Err(e) = overrides.add(&format!("!{dir}")) {
                tracing::warn!("Ignoring bad directory pattern {}: {}", dir, e);
            }
        }
        match overrides.build() {
            Ok(overrides) => {
                builder.overrides(overrides);
            }
            Err(e) => tracing::warn!("Failed to build directory overrides: {}", e),
        }

        builder
            .build()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!("Walk error: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(|entry| entry.into_path())
            .filter(move |path| self.accepts(path))
    }

    /// Collect all walkable files, sorted for a deterministic build order
    pub fn collect_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.walk().collect();
        files.sort();
        files
    }
}
