//! Filesystem watching that keeps a repository index current

pub mod watcher;

pub use watcher::{BatchReport, FileWatcher, WatchEvent, WatcherService, apply_batch, apply_events};
