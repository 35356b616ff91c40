//! Symbol table with per-file incremental replacement

use crate::diff::{DiffEngine, SymbolDelta};
use crate::model::{FileExtraction, Instance, ModuleDefinition, Symbol, SymbolId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Everything recorded for one indexed file. Replaced as a unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FileEntry {
    symbols: Vec<SymbolId>,
    modules: Vec<ModuleDefinition>,
    instances: Vec<Instance>,
    content_hash: Option<u64>,
}

/// Symbol table with O(1) expected lookup by exact name and by owning file.
///
/// Files that produced zero symbols are still tracked so that they count as
/// indexed and take part in text search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolTable {
    root: PathBuf,
    symbols: HashMap<SymbolId, Symbol>,
    /// For fast name lookup: name -> ids sharing that name across files
    by_name: HashMap<String, Vec<SymbolId>>,
    files: BTreeMap<PathBuf, FileEntry>,
    diff_engine: DiffEngine,
}

impl SymbolTable {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SymbolTable {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Repository root the symbols belong to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Replace every record of `path` with `extraction`.
    ///
    /// Safe for a path never seen before (pure insert). Returns what changed.
    pub fn replace_file(
        &mut self,
        path: &Path,
        extraction: FileExtraction,
        content_hash: Option<u64>,
    ) -> SymbolDelta {
        let old_ids = self.detach_file(path).unwrap_or_default();

        let mut entry = FileEntry {
            symbols: Vec::with_capacity(extraction.symbols.len()),
            modules: extraction.modules,
            instances: extraction.instances,
            content_hash,
        };

        for extracted in &extraction.symbols {
            let symbol = Symbol::new(&self.root, path, extracted);
            let id = symbol.id.clone();

            // Same (path, name, line) twice in one extraction: last record wins.
            if self.symbols.insert(id.clone(), symbol).is_none() {
                self.by_name
                    .entry(extracted.name.clone())
                    .or_default()
                    .push(id.clone());
                entry.symbols.push(id);
            }
        }

        let sequence = self.diff_engine.next_sequence();
        let delta = SymbolDelta::between(sequence, path.to_path_buf(), &old_ids, &entry.symbols);
        debug!(
            "Replaced {}: +{} -{} symbols",
            path.display(),
            delta.added.len(),
            delta.removed.len()
        );

        self.files.insert(path.to_path_buf(), entry);
        delta
    }

    /// Remove all records for a file. `None` if the file was never indexed.
    pub fn remove_file(&mut self, path: &Path) -> Option<SymbolDelta> {
        let old_ids = self.detach_file(path)?;
        let sequence = self.diff_engine.next_sequence();
        Some(SymbolDelta::between(sequence, path.to_path_buf(), &old_ids, &[]))
    }

    /// Drop the file entry and its symbols, returning the removed ids.
    fn detach_file(&mut self, path: &Path) -> Option<Vec<SymbolId>> {
        let entry = self.files.remove(path)?;
        for id in &entry.symbols {
            if let Some(symbol) = self.symbols.remove(id) {
                if let Some(ids) = self.by_name.get_mut(&symbol.name) {
                    ids.retain(|other| other != id);
                    if ids.is_empty() {
                        self.by_name.remove(&symbol.name);
                    }
                }
            }
        }
        Some(entry.symbols)
    }

    /// Content hash recorded at the last replacement of `path`.
    pub fn content_hash(&self, path: &Path) -> Option<u64> {
        self.files.get(path).and_then(|entry| entry.content_hash)
    }

    /// Exact, case-sensitive name lookup across all files.
    pub fn find_by_name(&self, name: &str) -> Vec<Symbol> {
        let mut found: Vec<Symbol> = self
            .by_name
            .get(name)
            .map(|ids| ids.iter().filter_map(|id| self.symbols.get(id).cloned()).collect())
            .unwrap_or_default();
        found.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then(a.line_start.cmp(&b.line_start))
        });
        found
    }

    /// All symbols ordered by file, then line.
    pub fn list_symbols(&self) -> Vec<Symbol> {
        self.files
            .values()
            .flat_map(|entry| {
                let mut in_file: Vec<Symbol> = entry
                    .symbols
                    .iter()
                    .filter_map(|id| self.symbols.get(id).cloned())
                    .collect();
                in_file.sort_by_key(|s| s.line_start);
                in_file
            })
            .collect()
    }

    /// Borrowing iterator over every symbol, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn get_symbol(&self, id: &SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    /// Symbols defined in one file, ordered by line.
    pub fn get_symbols_in_file(&self, path: &Path) -> Vec<Symbol> {
        let mut found: Vec<Symbol> = self
            .files
            .get(path)
            .map(|entry| {
                entry
                    .symbols
                    .iter()
                    .filter_map(|id| self.symbols.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        found.sort_by_key(|s| s.line_start);
        found
    }

    /// Every indexed file, including files that yielded no symbols.
    pub fn get_all_files(&self) -> Vec<PathBuf> {
        self.files.keys().cloned().collect()
    }

    pub fn contains_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Module definitions across all files, in file order.
    pub fn modules(&self) -> Vec<ModuleDefinition> {
        self.files
            .values()
            .flat_map(|entry| entry.modules.iter().cloned())
            .collect()
    }

    /// Instance records across all files, in file order.
    pub fn instances(&self) -> Vec<Instance> {
        self.files
            .values()
            .flat_map(|entry| entry.instances.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Current delta sequence number.
    pub fn sequence(&self) -> u64 {
        self.diff_engine.sequence()
    }

    /// Remove every file and symbol, keeping the root.
    pub fn clear(&mut self) {
        self.symbols.clear();
        self.by_name.clear();
        self.files.clear();
    }
}
