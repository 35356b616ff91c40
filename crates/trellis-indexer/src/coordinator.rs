//! Repository index lifecycle: discovery, extraction, graph and snapshot

use crate::config::TrellisConfig;
use crate::extractor::SymbolExtractor;
use crate::languages::{VerilogExtractor, get_extractor};
use crate::walker::Walker;
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use trellis_core::{
    FileExtraction, ModuleGraph, Symbol, SymbolDelta, SymbolId, SymbolTable, compute_content_hash,
    load_snapshot, save_snapshot,
};
use trellis_search::{SearchEngine, SearchMode, SearchResponse};

/// A file that could not be indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub path: PathBuf,
    pub message: String,
}

/// Summary of a full index build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexReport {
    pub files_discovered: usize,
    pub files_indexed: usize,
    /// Files whose content hash matched the table and were left alone.
    pub files_unchanged: usize,
    pub files_failed: usize,
    /// Indexed files that disappeared from disk since the last build.
    pub files_removed: usize,
    /// Symbols in the table after the build.
    pub symbols: usize,
    pub errors: Vec<FileError>,
    pub cancelled: bool,
}

enum FileOutcome {
    Extracted {
        path: PathBuf,
        hash: u64,
        extraction: FileExtraction,
    },
    Unchanged,
    Failed(FileError),
    Skipped,
}

/// One repository's symbol table, module graph and search engine.
///
/// Mutation goes through `&mut self`; share behind a lock for concurrent use.
pub struct RepositoryIndex {
    root: PathBuf,
    config: TrellisConfig,
    walker: Walker,
    symbols: SymbolTable,
    graph: ModuleGraph,
    engine: SearchEngine,
    extractor: Option<Box<dyn SymbolExtractor>>,
}

impl fmt::Debug for RepositoryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryIndex")
            .field("root", &self.root)
            .field("files", &self.symbols.file_count())
            .field("symbols", &self.symbols.len())
            .field("modules", &self.graph.node_count())
            .finish()
    }
}

impl RepositoryIndex {
    /// Open an empty index for `root`, reading its config.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = std::fs::canonicalize(root)
            .with_context(|| format!("Repository root not found: {}", root.display()))?;
        let config = TrellisConfig::load(&root)?;
        Self::with_config(root, config)
    }

    /// Open an empty index for `root` with an explicit config.
    pub fn with_config(root: impl Into<PathBuf>, config: TrellisConfig) -> Result<Self> {
        let root = root.into();
        let walker = Walker::new(&root, &config.indexer)?;
        let engine = SearchEngine::new(config.to_search_options());

        Ok(Self {
            symbols: SymbolTable::new(&root),
            graph: ModuleGraph::new(),
            root,
            config,
            walker,
            engine,
            extractor: None,
        })
    }

    /// Use `extractor` for every file instead of picking one by extension.
    pub fn with_extractor(mut self, extractor: Box<dyn SymbolExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Replace the search engine, e.g. to pin the text backends.
    pub fn with_search_engine(mut self, engine: SearchEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Open `root` and restore its snapshot. `None` if no snapshot exists.
    pub fn load(root: impl AsRef<Path>) -> Result<Option<Self>> {
        let mut index = Self::open(root)?;
        let snapshot = load_snapshot(&index.root)
            .with_context(|| format!("Failed to load snapshot for {}", index.root.display()))?;

        Ok(snapshot.map(|snapshot| {
            info!(
                "Loaded snapshot: {} files, {} symbols, {} modules",
                snapshot.symbols.file_count(),
                snapshot.symbols.len(),
                snapshot.graph.node_count()
            );
            index.symbols = snapshot.symbols;
            index.graph = snapshot.graph;
            index
        }))
    }

    /// Persist the symbol table and graph under `<root>/.trellis`.
    pub fn save(&self) -> Result<()> {
        save_snapshot(&self.root, &self.symbols, &self.graph)
            .with_context(|| format!("Failed to save snapshot for {}", self.root.display()))?;
        debug!("Saved snapshot for {}", self.root.display());
        Ok(())
    }

    /// Save and release the index.
    pub fn close(self) -> Result<()> {
        self.save()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &TrellisConfig {
        &self.config
    }

    pub fn walker(&self) -> &Walker {
        &self.walker
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    // ── Indexing ──

    pub fn build_index(&mut self) -> IndexReport {
        self.build_index_with_cancel(&AtomicBool::new(false))
    }

    /// Index every discoverable file, then rebuild the module graph.
    ///
    /// `cancel` is checked before each file; files already extracted are still
    /// applied, so a cancelled build leaves a valid partial index.
    pub fn build_index_with_cancel(&mut self, cancel: &AtomicBool) -> IndexReport {
        let files = self.walker.collect_files();
        let mut report = IndexReport {
            files_discovered: files.len(),
            ..Default::default()
        };
        info!("Indexing {} files under {}", files.len(), self.root.display());

        // Drop files that vanished since the last build.
        let stale: Vec<PathBuf> = self
            .symbols
            .get_all_files()
            .into_iter()
            .filter(|path| files.binary_search(path).is_err())
            .collect();
        for path in stale {
            self.symbols.remove_file(&path);
            report.files_removed += 1;
        }

        let outcomes: Vec<FileOutcome> = if self.config.indexer.parallel {
            files.par_iter().map(|path| self.process_file(path, cancel)).collect()
        } else {
            files.iter().map(|path| self.process_file(path, cancel)).collect()
        };

        for outcome in outcomes {
            match outcome {
                FileOutcome::Extracted { path, hash, extraction } => {
                    self.symbols.replace_file(&path, extraction, Some(hash));
                    report.files_indexed += 1;
                }
                FileOutcome::Unchanged => report.files_unchanged += 1,
                FileOutcome::Failed(error) => {
                    // Symbols from an earlier good read are no longer trustworthy.
                    self.symbols.remove_file(&error.path);
                    report.files_failed += 1;
                    report.errors.push(error);
                }
                FileOutcome::Skipped => report.cancelled = true,
            }
        }

        self.build_graph();
        report.symbols = self.symbols.len();

        info!(
            "Indexed {} files ({} unchanged, {} failed{}), {} symbols",
            report.files_indexed,
            report.files_unchanged,
            report.files_failed,
            if report.cancelled { ", cancelled" } else { "" },
            report.symbols
        );
        report
    }

    fn process_file(&self, path: &Path, cancel: &AtomicBool) -> FileOutcome {
        if cancel.load(Ordering::Relaxed) {
            return FileOutcome::Skipped;
        }

        let failed = |message: String| {
            warn!("Failed to index {}: {}", path.display(), message);
            FileOutcome::Failed(FileError {
                path: path.to_path_buf(),
                message,
            })
        };

        let content = match self.read_source(path) {
            Ok(content) => content,
            Err(e) => return failed(format!("{e:#}")),
        };
        let hash = compute_content_hash(&content);
        if self.symbols.content_hash(path) == Some(hash) {
            return FileOutcome::Unchanged;
        }

        match self.extract(path, &content) {
            Ok(extraction) => {
                debug!(
                    "Extracted {}: {} symbols, {} modules, {} instances",
                    path.display(),
                    extraction.symbols.len(),
                    extraction.modules.len(),
                    extraction.instances.len()
                );
                FileOutcome::Extracted {
                    path: path.to_path_buf(),
                    hash,
                    extraction,
                }
            }
            Err(e) => failed(format!("{e:#}")),
        }
    }

    /// Read a source file, refusing anything over the configured size.
    fn read_source(&self, path: &Path) -> Result<String> {
        let metadata =
            std::fs::metadata(path).with_context(|| format!("Failed to stat {}", path.display()))?;
        let limit = self.config.indexer.max_file_bytes;
        if metadata.len() > limit {
            anyhow::bail!("file is {} bytes, over the {} byte limit", metadata.len(), limit);
        }
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn extract(&self, path: &Path, content: &str) -> Result<FileExtraction> {
        match &self.extractor {
            Some(extractor) => extractor.extract(path, content),
            None => get_extractor(path)
                .unwrap_or_else(|| Box::new(VerilogExtractor))
                .extract(path, content),
        }
    }

    /// Absolute form of `path`, relative paths taken from the repository root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Re-extract one file and replace its records.
    ///
    /// With `content == None` the file is read from disk. When the content hash
    /// matches what is already indexed nothing is re-extracted and the delta is
    /// marked `unchanged`. The graph is not rebuilt.
    pub fn update_file(&mut self, path: &Path, content: Option<&str>) -> Result<SymbolDelta> {
        let path = self.resolve_path(path);
        let owned;
        let content = match content {
            Some(content) => content,
            None => {
                owned = self.read_source(&path)?;
                owned.as_str()
            }
        };

        let hash = compute_content_hash(content);
        if self.symbols.content_hash(&path) == Some(hash) {
            debug!("Unchanged: {}", path.display());
            return Ok(SymbolDelta {
                unchanged: true,
                ..SymbolDelta::new(self.symbols.sequence(), path)
            });
        }

        let extraction = self
            .extract(&path, content)
            .with_context(|| format!("Failed to extract symbols from {}", path.display()))?;
        Ok(self.symbols.replace_file(&path, extraction, Some(hash)))
    }

    /// Drop every record of `path`. `None` if it was never indexed.
    pub fn remove_file(&mut self, path: &Path) -> Option<SymbolDelta> {
        let path = self.resolve_path(path);
        self.symbols.remove_file(&path)
    }

    /// Rebuild the module graph from the table's current definitions.
    pub fn build_graph(&mut self) -> &ModuleGraph {
        let modules = self.symbols.modules();
        let instances = self.symbols.instances();
        self.graph.rebuild(&modules, &instances);

        info!(
            "Module graph: {} modules, {} edges, {} diagnostics",
            self.graph.node_count(),
            self.graph.edge_count(),
            self.graph.diagnostics().len()
        );
        for diagnostic in self.graph.diagnostics() {
            debug!("{}", diagnostic);
        }
        &self.graph
    }

    // ── Queries ──

    pub fn search(&self, query: &str, mode: Option<SearchMode>) -> trellis_core::Result<SearchResponse> {
        self.engine.search(&self.symbols, query, mode)
    }

    pub fn find_by_name(&self, name: &str) -> Vec<Symbol> {
        self.symbols.find_by_name(name)
    }

    pub fn list_symbols(&self) -> Vec<Symbol> {
        self.symbols.list_symbols()
    }

    pub fn get_symbol(&self, id: &SymbolId) -> Option<&Symbol> {
        self.symbols.get_symbol(id)
    }

    pub fn get_symbols_in_file(&self, path: &Path) -> Vec<Symbol> {
        self.symbols.get_symbols_in_file(&self.resolve_path(path))
    }

    pub fn get_all_files(&self) -> Vec<PathBuf> {
        self.symbols.get_all_files()
    }
}
