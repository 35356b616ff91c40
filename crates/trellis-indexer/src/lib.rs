//! HDL symbol extraction, file discovery and the repository index

pub mod config;
pub mod coordinator;
pub mod extractor;
pub mod languages;
pub mod walker;

#[cfg(test)]
pub mod test_utils;


pub use config::{IndexerConfig, SearchConfig, TrellisConfig};
pub use coordinator::{FileError, IndexReport, RepositoryIndex};
pub use extractor::SymbolExtractor;
pub use languages::{VerilogExtractor, get_extractor};
pub use walker::Walker;
