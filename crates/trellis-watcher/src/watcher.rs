//! Filesystem watcher implementation

use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};
use trellis_core::SymbolDelta;
use trellis_indexer::{FileError, IndexerConfig, RepositoryIndex, Walker};

/// How long to wait for more events after the first one of a batch.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Events emitted by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// File created
    Created(PathBuf),
    /// File modified
    Modified(PathBuf),
    /// File removed (or renamed away)
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(path) | WatchEvent::Modified(path) | WatchEvent::Removed(path) => path,
        }
    }
}

/// What one applied batch of events did to the index.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub errors: Vec<FileError>,
    pub deltas: Vec<SymbolDelta>,
    pub graph_rebuilt: bool,
}

/// File system watcher for HDL sources under one root
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    watched_paths: HashSet<PathBuf>,
    root_path: PathBuf,
}

impl FileWatcher {
    /// Create a watcher that reports only files `config` would index
    pub fn new(root_path: impl AsRef<Path>, config: &IndexerConfig) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();
        let filter = Arc::new(Walker::new(&root_path, config)?);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                debug!("File system event: {:?}", event);
                for watch_event in classify(&event, &filter) {
                    if let Err(e) = event_tx.send(watch_event) {
                        warn!("Failed to forward watch event: {}", e);
                    }
                }
            }
            Err(e) => {
                error!("File system watch error: {}", e);
            }
        })?;

        Ok(Self {
            watcher,
            event_rx,
            watched_paths: HashSet::new(),
            root_path,
        })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Watch a directory recursively
    pub fn watch_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Watching directory: {}", path.display());

        self.watcher.watch(path, RecursiveMode::Recursive)?;
        self.watched_paths.insert(path.to_path_buf());
        Ok(())
    }

    /// Stop watching a path
    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Stopping watch for: {}", path.display());

        self.watcher.unwatch(path)?;
        self.watched_paths.remove(path);
        Ok(())
    }

    /// Get the event receiver
    pub fn event_receiver(&mut self) -> &mut mpsc::UnboundedReceiver<WatchEvent> {
        &mut self.event_rx
    }

    /// Check if a path is being watched
    pub fn is_watching(&self, path: &Path) -> bool {
        self.watched_paths.contains(path)
    }
}

/// Map a notify event onto watch events for the paths `filter` accepts.
pub fn classify(event: &notify::Event, filter: &Walker) -> Vec<WatchEvent> {
    let paths = event.paths.iter().filter(|path| filter.accepts(path)).cloned();
    match event.kind {
        EventKind::Create(_) => paths.map(WatchEvent::Created).collect(),
        // Renames carry both ends; whichever still exists was the destination.
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .map(|path| {
                if path.exists() {
                    WatchEvent::Modified(path)
                } else {
                    WatchEvent::Removed(path)
                }
            })
            .collect(),
        EventKind::Modify(_) => paths.map(WatchEvent::Modified).collect(),
        EventKind::Remove(_) => paths.map(WatchEvent::Removed).collect(),
        _ => Vec::new(),
    }
}

/// Apply a batch of events on the blocking pool, holding the write lock there.
///
/// File reads, extraction and snapshot writes never run on the async executor.
pub async fn apply_batch(
    index: Arc<RwLock<RepositoryIndex>>,
    events: Vec<WatchEvent>,
    persist: bool,
) -> Result<BatchReport> {
    tokio::task::spawn_blocking(move || {
        let mut guard = index.blocking_write();
        apply_events(&mut guard, events, persist)
    })
    .await
    .context("Watch batch task panicked")
}

/// Apply a batch of events to `index`.
///
/// Only the last event per path counts. If anything changed, the module graph
/// is rebuilt and, when `persist` is set, the snapshot saved.
pub fn apply_events(index: &mut RepositoryIndex, events: Vec<WatchEvent>, persist: bool) -> BatchReport {
    let mut latest: BTreeMap<PathBuf, WatchEvent> = BTreeMap::new();
    for event in events {
        latest.insert(event.path().to_path_buf(), event);
    }

    let mut report = BatchReport::default();

    for (path, event) in latest {
        // A create or modify can race a delete that landed before we looked.
        let gone = matches!(event, WatchEvent::Removed(_)) || !path.exists();
        if gone {
            if let Some(delta) = index.remove_file(&path) {
                debug!("Removed {}", path.display());
                report.removed += 1;
                report.deltas.push(delta);
            }
            continue;
        }

        match index.update_file(&path, None) {
            Ok(delta) if delta.unchanged => report.unchanged += 1,
            Ok(delta) => {
                debug!(
                    "Updated {}: +{} -{}",
                    path.display(),
                    delta.added.len(),
                    delta.removed.len()
                );
                report.updated += 1;
                report.deltas.push(delta);
            }
            Err(e) => {
                warn!("Failed to update {}: {:#}", path.display(), e);
                report.errors.push(FileError {
                    path,
                    message: format!("{e:#}"),
                });
            }
        }
    }

    if report.updated + report.removed > 0 {
        index.build_graph();
        report.graph_rebuilt = true;
        if persist {
            if let Err(e) = index.save() {
                error!("Failed to save snapshot: {:#}", e);
                report.errors.push(FileError {
                    path: index.root().to_path_buf(),
                    message: format!("{e:#}"),
                });
            }
        }
    }

    report
}

/// Watcher service that keeps a shared repository index current
pub struct WatcherService {
    watcher: FileWatcher,
    index: Arc<RwLock<RepositoryIndex>>,
    debounce: Duration,
    persist: bool,
}

impl WatcherService {
    /// Create a new watcher service for the index's repository
    pub async fn new(index: Arc<RwLock<RepositoryIndex>>) -> Result<Self> {
        let (root, config) = {
            let guard = index.read().await;
            (guard.root().to_path_buf(), guard.config().indexer.clone())
        };
        let watcher = FileWatcher::new(&root, &config)?;

        Ok(Self {
            watcher,
            index,
            debounce: DEFAULT_DEBOUNCE,
            persist: true,
        })
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Keep changes in memory only; no snapshot writes.
    pub fn without_persistence(mut self) -> Self {
        self.persist = false;
        self
    }

    pub fn index(&self) -> Arc<RwLock<RepositoryIndex>> {
        Arc::clone(&self.index)
    }

    /// Start watching the repository root
    pub fn start_watching(&mut self) -> Result<()> {
        let root = self.watcher.root_path().to_path_buf();
        self.watcher.watch_directory(&root)?;
        info!("Started watching {}", root.display());
        Ok(())
    }

    /// Wait for the next debounced batch of events and apply it.
    ///
    /// Returns `None` once the event channel has closed.
    pub async fn next_batch(&mut self) -> Option<Result<BatchReport>> {
        let first = self.watcher.event_receiver().recv().await?;
        let mut events = vec![first];

        tokio::time::sleep(self.debounce).await;
        while let Ok(event) = self.watcher.event_receiver().try_recv() {
            events.push(event);
        }

        debug!("Applying {} watch events", events.len());
        Some(apply_batch(Arc::clone(&self.index), events, self.persist).await)
    }

    /// Process file system events until the watcher shuts down
    pub async fn process_events(&mut self) -> Result<()> {
        while let Some(report) = self.next_batch().await {
            let report = report?;
            if report.graph_rebuilt {
                info!(
                    "Applied changes: {} updated, {} removed, {} failed",
                    report.updated,
                    report.removed,
                    report.errors.len()
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::{Duration, timeout};

    const LEAF: &str = "module leaf(input a, output y);\n  assign y = a;\nendmodule\n";
    const TOP: &str = "module top(input a, output y);\n  leaf u_leaf(.a(a), .y(y));\nendmodule\n";

    fn repo() -> (TempDir, Arc<RwLock<RepositoryIndex>>) {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("leaf.v"), LEAF).unwrap();
        fs::write(temp_dir.path().join("top.v"), TOP).unwrap();

        let mut index = RepositoryIndex::open(temp_dir.path()).unwrap();
        index.build_index();
        (temp_dir, Arc::new(RwLock::new(index)))
    }

    #[tokio::test]
    async fn test_file_watcher_creation() {
        let temp_dir = TempDir::new().unwrap();
        let mut watcher = FileWatcher::new(temp_dir.path(), &IndexerConfig::default()).unwrap();
        watcher.watch_directory(temp_dir.path()).unwrap();
        assert!(watcher.is_watching(temp_dir.path()));
        watcher.unwatch(temp_dir.path()).unwrap();
        assert!(!watcher.is_watching(temp_dir.path()));
    }

    #[test]
    fn test_classify_filters_paths() {
        let root = Path::new("/repo");
        let filter = Walker::new(root, &IndexerConfig::default()).unwrap();

        let event = notify::Event::new(EventKind::Create(notify::event::CreateKind::File))
            .add_path(root.join("rtl/alu.v"))
            .add_path(root.join("README.md"))
            .add_path(root.join("obj_dir/Valu.v"));
        assert_eq!(classify(&event, &filter), vec![WatchEvent::Created(root.join("rtl/alu.v"))]);

        let event = notify::Event::new(EventKind::Remove(notify::event::RemoveKind::File))
            .add_path(root.join("top.sv"));
        assert_eq!(classify(&event, &filter), vec![WatchEvent::Removed(root.join("top.sv"))]);

        let event = notify::Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(root.join("top.sv"));
        assert!(classify(&event, &filter).is_empty());
    }

    #[tokio::test]
    async fn test_modify_rebuilds_graph() {
        let (temp_dir, index) = repo();
        let top = index.read().await.root().join("top.v");
        fs::write(&top, TOP.replace("leaf u_leaf", "leaf u_leaf0(.a(a), .y());\n  leaf u_leaf1")).unwrap();

        let report = apply_batch(Arc::clone(&index), vec![WatchEvent::Modified(top.clone())], false)
            .await
            .unwrap();
        assert_eq!(report.updated, 1);
        assert!(report.graph_rebuilt);

        let guard = index.read().await;
        let node = guard.graph().module("top").unwrap();
        assert_eq!(node.instances.len(), 2);
        assert_eq!(guard.find_by_name("u_leaf1").len(), 1);
        drop(guard);
        drop(temp_dir);
    }

    #[tokio::test]
    async fn test_unchanged_file_skips_rebuild() {
        let (_temp_dir, index) = repo();
        let leaf = index.read().await.root().join("leaf.v");

        let report = apply_batch(Arc::clone(&index), vec![WatchEvent::Modified(leaf)], false)
            .await
            .unwrap();
        assert_eq!(report.unchanged, 1);
        assert!(!report.graph_rebuilt);
    }

    #[tokio::test]
    async fn test_last_event_per_path_wins() {
        let (_temp_dir, index) = repo();
        let leaf = index.read().await.root().join("leaf.v");
        fs::remove_file(&leaf).unwrap();

        let events = vec![WatchEvent::Modified(leaf.clone()), WatchEvent::Removed(leaf.clone())];
        let report = apply_batch(Arc::clone(&index), events, false).await.unwrap();
        assert_eq!(report.removed, 1);
        assert!(report.errors.is_empty());

        let guard = index.read().await;
        assert!(!guard.graph().contains("leaf"));
        assert_eq!(guard.graph().external_references("top"), vec!["leaf"]);
    }

    #[tokio::test]
    async fn test_batch_persists_snapshot() {
        let (temp_dir, index) = repo();
        let new_file = index.read().await.root().join("extra.sv");
        fs::write(&new_file, "module extra;\nendmodule\n").unwrap();

        let report = apply_batch(Arc::clone(&index), vec![WatchEvent::Created(new_file)], true)
            .await
            .unwrap();
        assert_eq!(report.updated, 1);

        let restored = RepositoryIndex::load(temp_dir.path()).unwrap().unwrap();
        assert!(restored.graph().contains("extra"));
    }

    #[test]
    fn test_apply_events_without_a_runtime() {
        let (_temp_dir, index) = repo();
        let mut index = Arc::try_unwrap(index).ok().unwrap().into_inner();
        let extra = index.root().join("extra.v");
        fs::write(&extra, "module extra;\n  leaf u_leaf(.a(), .y());\nendmodule\n").unwrap();

        let report = apply_events(&mut index, vec![WatchEvent::Created(extra)], false);
        assert_eq!(report.updated, 1);
        let mut parents = index.graph().parents("leaf");
        parents.sort();
        assert_eq!(parents, vec!["extra", "top"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_batch_leaves_executor_free_for_readers() {
        let (_temp_dir, index) = repo();
        let top = index.read().await.root().join("top.v");
        fs::write(&top, TOP.replace("u_leaf", "u_leaf_main")).unwrap();

        let reader_index = Arc::clone(&index);
        let reader = tokio::spawn(async move { reader_index.read().await.graph().node_count() });
        let report = apply_batch(Arc::clone(&index), vec![WatchEvent::Modified(top)], false)
            .await
            .unwrap();

        assert_eq!(reader.await.unwrap(), 2);
        assert_eq!(report.updated, 1);
        assert_eq!(index.read().await.find_by_name("u_leaf_main").len(), 1);
    }

    #[tokio::test]
    async fn test_service_applies_live_changes() {
        let (_temp_dir, index) = repo();
        let mut service = WatcherService::new(Arc::clone(&index))
            .await
            .unwrap()
            .with_debounce(Duration::from_millis(50))
            .without_persistence();
        service.start_watching().unwrap();

        let root = index.read().await.root().to_path_buf();
        fs::write(root.join("fresh.v"), "module fresh;\nendmodule\n").unwrap();

        // Platform watchers differ in timing; only assert when an event arrived.
        if let Ok(Some(report)) = timeout(Duration::from_secs(5), service.next_batch()).await {
            let report = report.unwrap();
            assert!(report.errors.is_empty());
            if report.graph_rebuilt {
                assert!(index.read().await.graph().contains("fresh"));
            }
        }
    }
}
