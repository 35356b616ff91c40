//! Snapshot persistence for the symbol table and module graph

use crate::error::{Result, TrellisError};
use crate::graph::ModuleGraph;
use crate::symbols::SymbolTable;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Cache directory: .trellis/
pub const CACHE_DIR: &str = ".trellis";

/// Binary snapshot file
pub const SNAPSHOT_FILE: &str = "index.bin";

/// Human-readable marker written next to the snapshot
pub const META_FILE: &str = "meta.json";

/// Config file kept inside the cache directory; never removed by `clear_cache`.
pub const CONFIG_FILE: &str = "config.toml";

/// Bumped whenever a persisted type changes shape.
pub const SNAPSHOT_VERSION: u32 = 2;

/// Everything that must round-trip between sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    pub symbols: SymbolTable,
    pub graph: ModuleGraph,
}

impl Snapshot {
    pub fn new(symbols: SymbolTable, graph: ModuleGraph) -> Self {
        Snapshot {
            format_version: SNAPSHOT_VERSION,
            symbols,
            graph,
        }
    }
}

/// Get cache directory path
pub fn cache_dir(root: &Path) -> PathBuf {
    root.join(CACHE_DIR)
}

/// Get snapshot file path
pub fn snapshot_path(root: &Path) -> PathBuf {
    root.join(CACHE_DIR).join(SNAPSHOT_FILE)
}

pub fn meta_path(root: &Path) -> PathBuf {
    root.join(CACHE_DIR).join(META_FILE)
}

/// Ensure cache directory exists
pub fn ensure_cache_dir(root: &Path) -> std::io::Result<()> {
    let cache = cache_dir(root);
    if !cache.exists() {
        std::fs::create_dir_all(&cache)?;
    }
    Ok(())
}

/// Write the snapshot and its metadata marker.
pub fn save_snapshot(root: &Path, symbols: &SymbolTable, graph: &ModuleGraph) -> Result<()> {
    ensure_cache_dir(root)?;

    #[derive(Serialize)]
    struct SnapshotRef<'a> {
        format_version: u32,
        symbols: &'a SymbolTable,
        graph: &'a ModuleGraph,
    }

    let bytes = bincode::serialize(&SnapshotRef {
        format_version: SNAPSHOT_VERSION,
        symbols,
        graph,
    })?;
    let path = snapshot_path(root);
    std::fs::write(&path, bytes)?;

    let marker = serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "format_version": SNAPSHOT_VERSION,
        "files": symbols.file_count(),
        "symbols": symbols.len(),
        "modules": graph.node_count(),
        "edges": graph.edge_count(),
        "cached_at": chrono::Utc::now().to_rfc3339()
    });
    std::fs::write(meta_path(root), serde_json::to_string_pretty(&marker)?)?;

    tracing::debug!("Snapshot saved: {}", path.display());
    Ok(())
}

/// Load the snapshot. `Ok(None)` when none has been written yet.
pub fn load_snapshot(root: &Path) -> Result<Option<Snapshot>> {
    let path = snapshot_path(root);
    if !path.exists() {
        return Ok(None);
    }

    let bytes = std::fs::read(&path)?;
    // The version leads the encoding, so it decodes even when the rest has changed shape.
    let found: u32 = bincode::deserialize(&bytes)?;
    if found != SNAPSHOT_VERSION {
        return Err(TrellisError::SnapshotVersion {
            found,
            expected: SNAPSHOT_VERSION,
        });
    }
    let snapshot: Snapshot = bincode::deserialize(&bytes)?;

    tracing::debug!("Snapshot loaded from: {}", path.display());
    Ok(Some(snapshot))
}

/// Remove cache artifacts, keeping a config file if one lives in the cache directory.
pub fn clear_cache(root: &Path) -> std::io::Result<()> {
    let cache = cache_dir(root);
    if !cache.exists() {
        return Ok(());
    }

    for entry in std::fs::read_dir(&cache)? {
        let entry = entry?;
        if entry.file_name() == CONFIG_FILE {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
    }

    if std::fs::read_dir(&cache)?.next().is_none() {
        std::fs::remove_dir(&cache)?;
    }
    Ok(())
}
