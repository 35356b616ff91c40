//! Trellis Core: HDL data model, symbol table, module graph and snapshots

pub mod cache;
pub mod diff;
pub mod error;
pub mod graph;
pub mod model;
pub mod symbols;

#[cfg(test)]
mod tests;

pub use cache::{
    CACHE_DIR, CONFIG_FILE, SNAPSHOT_FILE, SNAPSHOT_VERSION, Snapshot, cache_dir, clear_cache,
    ensure_cache_dir, load_snapshot, save_snapshot, snapshot_path,
};
pub use diff::{DiffEngine, SymbolDelta};
pub use error::{Result, TrellisError};
pub use graph::{HierarchyNode, ModuleComplexity, ModuleGraph, SignalImpact};
pub use model::{
    Connection, ExtractedSymbol, FileExtraction, GraphDiagnostic, Instance, Instantiation,
    Language, ModuleDefinition, ModuleNode, Parameter, Port, PortDirection, SOURCE_EXTENSIONS,
    SignalEndpoint, SignalFlowEdge, Symbol, SymbolId, SymbolKind, compute_content_hash,
};
pub use symbols::SymbolTable;
