//! Symbol deltas produced by incremental file updates

use crate::model::SymbolId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What a single file replacement changed in the symbol table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolDelta {
    /// Monotonically increasing sequence number.
    pub sequence: u64,
    /// File that was replaced or removed.
    pub path: PathBuf,
    /// Symbols present after the update but not before.
    pub added: Vec<SymbolId>,
    /// Symbols present before the update but not after.
    pub removed: Vec<SymbolId>,
    /// Set when the file's content hash was unchanged and nothing was re-extracted.
    pub unchanged: bool,
}

impl SymbolDelta {
    /// Create an empty delta with given sequence number.
    pub fn new(sequence: u64, path: PathBuf) -> Self {
        SymbolDelta {
            sequence,
            path,
            added: Vec::new(),
            removed: Vec::new(),
            unchanged: false,
        }
    }

    /// Check if this delta is empty (no changes).
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Compute added/removed ids between the old and new symbol sets of one file.
    pub fn between(sequence: u64, path: PathBuf, old: &[SymbolId], new: &[SymbolId]) -> Self {
        let mut delta = SymbolDelta::new(sequence, path);
        delta.added = new.iter().filter(|id| !old.contains(id)).cloned().collect();
        delta.removed = old.iter().filter(|id| !new.contains(id)).cloned().collect();
        delta
    }
}

/// Hands out delta sequence numbers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffEngine {
    sequence: u64,
}

impl DiffEngine {
    pub fn new() -> Self {
        DiffEngine { sequence: 0 }
    }

    /// Advance and return the next sequence number.
    pub fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    /// Get current sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}
