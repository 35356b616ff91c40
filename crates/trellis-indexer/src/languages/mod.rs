//! Extractors per hardware description language

pub mod verilog;

pub use verilog::VerilogExtractor;

use crate::extractor::SymbolExtractor;
use std::path::Path;
use trellis_core::Language;

/// Get the appropriate extractor for a file based on its extension
pub fn get_extractor(path: &Path) -> Option<Box<dyn SymbolExtractor>> {
    match Language::from_path(path) {
        Language::Verilog | Language::SystemVerilog => Some(Box::new(VerilogExtractor)),
        Language::Other => None,
    }
}
