//! Hybrid symbol + text search

use crate::ranking::score_name;
use crate::text::{GrepSearcherBackend, RipgrepProcess, TextMatch, TextSearchBackend, TextSearchOptions};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};
use trellis_core::{Result, SOURCE_EXTENSIONS, SymbolId, SymbolKind, SymbolTable, TrellisError};

/// Fixed score carried by every text match.
pub const TEXT_MATCH_SCORE: u32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Ranked symbol names, falling back to text when nothing scores.
    #[default]
    Symbol,
    /// Full-text search only.
    Text,
}

impl FromStr for SearchMode {
    type Err = TrellisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "symbol" => Ok(SearchMode::Symbol),
            "text" => Ok(SearchMode::Text),
            other => Err(TrellisError::UnknownSearchMode {
                mode: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchMode::Symbol => "symbol",
            SearchMode::Text => "text",
        })
    }
}

/// Where a result came from. Symbol results always sort ahead of text results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Symbol,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub source: MatchSource,
    pub file_path: PathBuf,
    pub line: u32,
    pub score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_id: Option<SymbolId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<SymbolKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl From<TextMatch> for SearchResult {
    fn from(m: TextMatch) -> Self {
        SearchResult {
            source: MatchSource::Text,
            file_path: m.file_path,
            line: m.line,
            score: TEXT_MATCH_SCORE,
            symbol_id: None,
            name: None,
            kind: None,
            column: Some(m.column),
            snippet: Some(m.snippet),
        }
    }
}

/// Results plus what the engine had to do to produce them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    /// Text backend that answered, if text search ran.
    pub text_backend: Option<String>,
    /// Backends that failed before one succeeded.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub prefer_ripgrep: bool,
    pub ripgrep_binary: String,
    /// Extensions eligible for text search.
    pub extensions: Vec<String>,
    pub text: TextSearchOptions,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            prefer_ripgrep: true,
            ripgrep_binary: "rg".to_string(),
            extensions: SOURCE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            text: TextSearchOptions::default(),
        }
    }
}

/// Outcome of one text search across the backend chain.
struct TextOutcome {
    matches: Vec<TextMatch>,
    backend: Option<&'static str>,
    warnings: Vec<String>,
}

/// Ranked search over a symbol table with a text-search fallback chain.
///
/// Holds no index state of its own; every call reads the table it is given.
pub struct SearchEngine {
    backends: Vec<Box<dyn TextSearchBackend>>,
    /// Backend name -> availability, probed once.
    availability: DashMap<&'static str, bool>,
    options: SearchOptions,
}

impl fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchEngine")
            .field("backends", &self.backend_names())
            .field("options", &self.options)
            .finish()
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        SearchEngine::new(SearchOptions::default())
    }
}

impl SearchEngine {
    /// Engine with ripgrep (if preferred) ahead of the in-process searcher.
    pub fn new(options: SearchOptions) -> Self {
        let mut backends: Vec<Box<dyn TextSearchBackend>> = Vec::new();
        if options.prefer_ripgrep {
            backends.push(Box::new(RipgrepProcess::new(options.ripgrep_binary.clone())));
        }
        backends.push(Box::new(GrepSearcherBackend::new()));
        SearchEngine::with_backends(backends, options)
    }

    /// Engine with an explicit backend chain, tried in order.
    pub fn with_backends(backends: Vec<Box<dyn TextSearchBackend>>, options: SearchOptions) -> Self {
        SearchEngine {
            backends,
            availability: DashMap::new(),
            options,
        }
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Forget cached availability probes, e.g. after PATH changes.
    pub fn reset_availability(&self) {
        self.availability.clear();
    }

    fn backend_available(&self, backend: &dyn TextSearchBackend) -> bool {
        *self
            .availability
            .entry(backend.name())
            .or_insert_with(|| backend.is_available())
    }

    fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.options.extensions.iter().any(|allowed| allowed == ext))
    }

    /// Search `table` for `query`.
    ///
    /// Text search runs when `mode` is [`SearchMode::Text`] or when no symbol
    /// scores above zero. An empty query is rejected before any work is done.
    pub fn search(&self, table: &SymbolTable, query: &str, mode: Option<SearchMode>) -> Result<SearchResponse> {
        if query.trim().is_empty() {
            return Err(TrellisError::invalid_query("query must not be empty"));
        }
        let mode = mode.unwrap_or_default();

        let mut response = SearchResponse::default();
        if mode == SearchMode::Symbol {
            response.results = self.search_symbols(table, query);
        }

        if mode == SearchMode::Text || response.results.is_empty() {
            let outcome = self.search_text(&table.get_all_files(), query)?;
            response.text_backend = outcome.backend.map(str::to_string);
            response.warnings = outcome.warnings;
            response
                .results
                .extend(outcome.matches.into_iter().map(SearchResult::from));
        }

        sort_results(&mut response.results);
        debug!(
            "search {:?} ({}) -> {} results",
            query,
            mode,
            response.results.len()
        );
        Ok(response)
    }

    /// Every symbol whose name scores above zero.
    pub fn search_symbols(&self, table: &SymbolTable, query: &str) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = table
            .iter()
            .filter_map(|symbol| {
                let score = score_name(&symbol.name, query);
                (score > 0).then(|| SearchResult {
                    source: MatchSource::Symbol,
                    file_path: symbol.file_path.clone(),
                    line: symbol.line_start,
                    score,
                    symbol_id: Some(symbol.id.clone()),
                    name: Some(symbol.name.clone()),
                    kind: Some(symbol.kind),
                    column: None,
                    snippet: None,
                })
            })
            .collect();
        sort_results(&mut results);
        results
    }

    /// Literal line search over the source files among `files`.
    fn search_text(&self, files: &[PathBuf], query: &str) -> Result<TextOutcome> {
        let files: Vec<PathBuf> = files
            .iter()
            .filter(|path| self.is_source_file(path))
            .cloned()
            .collect();

        let mut warnings = Vec::new();
        for backend in &self.backends {
            if !self.backend_available(backend.as_ref()) {
                debug!("Text backend {} unavailable", backend.name());
                continue;
            }
            if files.is_empty() {
                return Ok(TextOutcome {
                    matches: Vec::new(),
                    backend: Some(backend.name()),
                    warnings,
                });
            }
            match backend.search(&files, query, &self.options.text) {
                Ok(matches) => {
                    return Ok(TextOutcome {
                        matches,
                        backend: Some(backend.name()),
                        warnings,
                    });
                }
                Err(e) => {
                    warn!("Text backend {} failed: {}", backend.name(), e);
                    warnings.push(format!("{}: {}", backend.name(), e));
                }
            }
        }

        let message = if warnings.is_empty() {
            "no text search backend is installed".to_string()
        } else {
            warnings.join("; ")
        };
        Err(TrellisError::TextSearchUnavailable { message })
    }
}

/// Symbols first, then score descending, then path and line ascending.
pub(crate) fn sort_results(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then_with(|| b.score.cmp(&a.score))
            .then_with(|| a.file_path.cmp(&b.file_path))
            .then_with(|| a.line.cmp(&b.line))
            .then_with(|| a.column.cmp(&b.column))
    });
}
