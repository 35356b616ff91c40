//! CLI command implementations

use anyhow::Context;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use trellis_indexer::RepositoryIndex;
use trellis_search::SearchMode;
use trellis_watcher::WatcherService;

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Restore the snapshot, or build and save one if there is none.
async fn load_or_build(root: PathBuf) -> anyhow::Result<RepositoryIndex> {
    tokio::task::spawn_blocking(move || -> anyhow::Result<RepositoryIndex> {
        if let Some(index) = RepositoryIndex::load(&root)? {
            return Ok(index);
        }
        tracing::info!("No snapshot for {}, indexing", root.display());
        let mut index = RepositoryIndex::open(&root)?;
        index.build_index();
        index.save()?;
        Ok(index)
    })
    .await
    .context("Indexing task panicked")?
}

pub async fn index(root: PathBuf) -> anyhow::Result<()> {
    tracing::info!("Indexing repository: {}", root.display());

    let report = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let mut index = match RepositoryIndex::load(&root)? {
            Some(index) => index,
            None => RepositoryIndex::open(&root)?,
        };
        let report = index.build_index();
        index.save()?;
        tracing::info!(
            "{} modules, {} edges",
            index.graph().node_count(),
            index.graph().edge_count()
        );
        Ok(report)
    })
    .await
    .context("Indexing task panicked")??;

    print_json(&report)
}

pub async fn search(root: PathBuf, query: String, mode: Option<String>) -> anyhow::Result<()> {
    let mode = mode.map(|m| m.parse::<SearchMode>()).transpose()?;
    let index = load_or_build(root).await?;
    let response = index.search(&query, mode)?;
    for warning in &response.warnings {
        tracing::warn!("{}", warning);
    }
    print_json(&response)
}

pub async fn symbols(root: PathBuf, file: Option<PathBuf>, name: Option<String>) -> anyhow::Result<()> {
    let index = load_or_build(root).await?;
    let symbols = match (file, name) {
        (Some(file), name) => index
            .get_symbols_in_file(&file)
            .into_iter()
            .filter(|s| name.as_deref().is_none_or(|n| s.name == n))
            .collect(),
        (None, Some(name)) => index.find_by_name(&name),
        (None, None) => index.list_symbols(),
    };
    print_json(&symbols)
}

pub async fn top(root: PathBuf) -> anyhow::Result<()> {
    let index = load_or_build(root).await?;
    print_json(&index.graph().top_level_modules())
}

pub async fn leaves(root: PathBuf) -> anyhow::Result<()> {
    let index = load_or_build(root).await?;
    print_json(&index.graph().leaf_modules())
}

pub async fn tree(root: PathBuf) -> anyhow::Result<()> {
    let index = load_or_build(root).await?;
    print_json(&index.graph().hierarchy())
}

pub async fn path(root: PathBuf, from: String, to: String) -> anyhow::Result<()> {
    let index = load_or_build(root).await?;
    match index.graph().find_module_path(&from, &to) {
        Some(path) => print_json(&path),
        None => anyhow::bail!("No instantiation path from {from} to {to}"),
    }
}

pub async fn impact(root: PathBuf, signal: String) -> anyhow::Result<()> {
    let index = load_or_build(root).await?;
    print_json(&index.graph().signal_impact(&signal))
}

pub async fn critical_path(root: PathBuf) -> anyhow::Result<()> {
    let index = load_or_build(root).await?;
    print_json(&index.graph().critical_path())
}

pub async fn complexity(root: PathBuf, module: String) -> anyhow::Result<()> {
    let index = load_or_build(root).await?;
    match index.graph().module_complexity(&module) {
        Some(complexity) => print_json(&complexity),
        None => anyhow::bail!("Unknown module: {module}"),
    }
}

/// Run the file watcher until interrupted
pub async fn watch(root: PathBuf, debounce_ms: u64) -> anyhow::Result<()> {
    let index = Arc::new(RwLock::new(load_or_build(root).await?));
    let mut service = WatcherService::new(Arc::clone(&index))
        .await?
        .with_debounce(Duration::from_millis(debounce_ms));
    service.start_watching()?;

    tokio::select! {
        result = service.process_events() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Stopping watcher");
        }
    }

    index.read().await.save()
}

pub fn clear(root: PathBuf) -> anyhow::Result<()> {
    tracing::info!("Clearing cache for: {}", root.display());

    trellis_core::clear_cache(&root)?;

    tracing::info!("Cache cleared");
    Ok(())
}
