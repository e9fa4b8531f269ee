//! Async wrapper over a `notify` watcher.
//!
//! Raw notifications are forwarded from the watcher's callback thread into a
//! tokio channel. The owner declares the set of directories it wants watched
//! and [`FsWatcher::sync`] reconciles the registrations.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

pub struct FsWatcher {
    watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    mode: RecursiveMode,
    watched: BTreeSet<PathBuf>,
}

impl FsWatcher {
    pub fn new(mode: RecursiveMode) -> Result<Self> {
        let (tx, events) = mpsc::unbounded_channel();
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver only goes away when the owner is dropped.
                let _ = tx.send(res);
            },
            Config::default(),
        )
        .context("Failed to create file watcher")?;
        Ok(Self {
            watcher,
            events,
            mode,
            watched: BTreeSet::new(),
        })
    }

    /// Register exactly `wanted`. Returns the directories that were newly
    /// registered. A directory that cannot be watched is skipped and tried
    /// again on the next call.
    pub fn sync(&mut self, wanted: &BTreeSet<PathBuf>) -> Vec<PathBuf> {
        let stale: Vec<PathBuf> = self.watched.difference(wanted).cloned().collect();
        for path in stale {
            if let Err(e) = self.watcher.unwatch(&path) {
                tracing::debug!(path = %path.display(), error = %e, "unwatch failed");
            }
            self.watched.remove(&path);
        }

        let mut added = Vec::new();
        for path in wanted {
            if self.watched.contains(path) {
                continue;
            }
            match self.watcher.watch(path, self.mode) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "watching directory");
                    self.watched.insert(path.clone());
                    added.push(path.clone());
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot watch directory");
                }
            }
        }
        added
    }

    pub fn watched(&self) -> &BTreeSet<PathBuf> {
        &self.watched
    }

    /// Next raw notification.
    pub async fn next(&mut self) -> Option<notify::Result<Event>> {
        self.events.recv().await
    }
}

/// Whether an event can change the content or presence of a file. Reads and
/// permission or timestamp updates cannot.
pub fn is_content_change(kind: &EventKind) -> bool {
    !matches!(
        kind,
        EventKind::Access(_) | EventKind::Modify(ModifyKind::Metadata(_))
    )
}

/// Nearest existing directory at or above `path`.
pub fn existing_ancestor(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|candidate| candidate.is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_content_change_kinds() {
        assert!(is_content_change(&EventKind::Create(CreateKind::File)));
        assert!(is_content_change(&EventKind::Remove(RemoveKind::File)));
        assert!(is_content_change(&EventKind::Modify(ModifyKind::Data(
            DataChange::Content
        ))));
        assert!(is_content_change(&EventKind::Any));
        assert!(!is_content_change(&EventKind::Access(AccessKind::Read)));
        assert!(!is_content_change(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::Permissions
        ))));
    }

    #[test]
    fn test_existing_ancestor_walks_up() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("a/b/settings.toml");
        assert_eq!(existing_ancestor(&missing), Some(dir.path().to_path_buf()));
        assert_eq!(
            existing_ancestor(dir.path()),
            Some(dir.path().to_path_buf())
        );
    }

    #[test]
    fn test_sync_registers_and_drops_directories() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        let mut watcher = FsWatcher::new(RecursiveMode::NonRecursive).unwrap();

        let added = watcher.sync(&[a.clone(), b.clone()].into());
        assert_eq!(added, vec![a.clone(), b.clone()]);
        assert!(watcher.sync(&[a.clone(), b.clone()].into()).is_empty());

        let missing = dir.path().join("missing");
        let added = watcher.sync(&[b.clone(), missing].into());
        assert!(added.is_empty());
        assert_eq!(watcher.watched(), &BTreeSet::from([b]));
    }

    #[tokio::test]
    async fn test_file_write_is_delivered() {
        let dir = tempdir().unwrap();
        let mut watcher = FsWatcher::new(RecursiveMode::NonRecursive).unwrap();
        watcher.sync(&BTreeSet::from([dir.path().to_path_buf()]));

        let file = dir.path().join("dw.json");
        std::fs::write(&file, "{}").unwrap();
        let seen = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match watcher.next().await {
                    Some(Ok(event)) if event.paths.iter().any(|p| p.ends_with("dw.json")) => {
                        return event;
                    }
                    Some(_) => continue,
                    None => panic!("watcher channel closed"),
                }
            }
        })
        .await
        .expect("no event for the written file");
        assert!(is_content_change(&seen.kind));
    }
}
