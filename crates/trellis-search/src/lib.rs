//! Symbol ranking and full-text search

pub mod engine;
pub mod ranking;
pub mod text;


pub use engine::{MatchSource, SearchEngine, SearchMode, SearchOptions, SearchResponse, SearchResult, TEXT_MATCH_SCORE};
pub use ranking::{levenshtein_distance, score_name};
pub use text::{GrepSearcherBackend, RipgrepProcess, TextMatch, TextSearchBackend, TextSearchOptions};
