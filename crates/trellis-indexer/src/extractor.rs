//! Extraction source trait definition

use std::path::Path;
use trellis_core::FileExtraction;

/// Turns the content of one source file into symbols, module definitions and
/// instance records.
///
/// Returning an empty [`FileExtraction`] is valid and means "nothing found";
/// an `Err` marks the file as failed without stopping the surrounding batch.
pub trait SymbolExtractor: Send + Sync {
    fn extract(&self, path: &Path, content: &str) -> anyhow::Result<FileExtraction>;
}
