//! Repository configuration (`.trellis/config.toml`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use trellis_core::{CACHE_DIR, CONFIG_FILE, SOURCE_EXTENSIONS};
use trellis_search::{SearchOptions, TextSearchOptions};

/// Config file at the repository root, read when the cache directory has none.
pub const ROOT_CONFIG_FILE: &str = "trellis.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrellisConfig {
    #[serde(default)]
    pub indexer: IndexerConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// File extensions to index
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory names skipped anywhere in the tree
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,

    /// Extra glob patterns, matched against paths relative to the root
    #[serde(default)]
    pub ignore_globs: Vec<String>,

    /// Files larger than this are skipped and reported
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Extract files on the rayon pool
    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            ignore_dirs: default_ignore_dirs(),
            ignore_globs: Vec::new(),
            max_file_bytes: default_max_file_bytes(),
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Try an installed ripgrep before the in-process searcher
    #[serde(default = "default_true")]
    pub prefer_ripgrep: bool,

    #[serde(default = "default_ripgrep_binary")]
    pub ripgrep_binary: String,

    #[serde(default = "default_max_text_matches")]
    pub max_text_matches: usize,

    #[serde(default = "default_true")]
    pub case_insensitive_text: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            prefer_ripgrep: true,
            ripgrep_binary: default_ripgrep_binary(),
            max_text_matches: default_max_text_matches(),
            case_insensitive_text: true,
        }
    }
}

fn default_extensions() -> Vec<String> {
    SOURCE_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_ignore_dirs() -> Vec<String> {
    vec![
        ".git".to_string(),
        "build".to_string(),
        "target".to_string(),
        "node_modules".to_string(),
        "obj_dir".to_string(),
        "sim_build".to_string(),
        "work".to_string(),
        CACHE_DIR.to_string(),
    ]
}

fn default_max_file_bytes() -> u64 {
    4 * 1024 * 1024
}

fn default_ripgrep_binary() -> String {
    "rg".to_string()
}

fn default_max_text_matches() -> usize {
    500
}

fn default_true() -> bool {
    true
}

impl TrellisConfig {
    /// Load config for the repository at `root`, or defaults if there is none.
    pub fn load(root: &Path) -> Result<Self> {
        let Some(path) = Self::config_path(root) else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: TrellisConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// The config file in effect for `root`, if any exists.
    pub fn config_path(root: &Path) -> Option<PathBuf> {
        [root.join(CACHE_DIR).join(CONFIG_FILE), root.join(ROOT_CONFIG_FILE)]
            .into_iter()
            .find(|p| p.is_file())
    }

    /// Write this config to `<root>/.trellis/config.toml`.
    pub fn save(&self, root: &Path) -> Result<PathBuf> {
        trellis_core::ensure_cache_dir(root)
            .with_context(|| format!("Failed to create {}", root.join(CACHE_DIR).display()))?;
        let path = root.join(CACHE_DIR).join(CONFIG_FILE);
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(path)
    }

    pub fn to_search_options(&self) -> SearchOptions {
        SearchOptions {
            prefer_ripgrep: self.search.prefer_ripgrep,
            ripgrep_binary: self.search.ripgrep_binary.clone(),
            extensions: self.indexer.extensions.clone(),
            text: TextSearchOptions {
                case_insensitive: self.search.case_insensitive_text,
                max_matches: self.search.max_text_matches,
            },
        }
    }
}
