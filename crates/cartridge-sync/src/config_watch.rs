//! Change detection for settings and upload config files.
//!
//! The directories holding the watched files are registered with a
//! non-recursive `notify` watcher. When a directory on the way to a file does
//! not exist yet, its nearest existing ancestor is watched instead and the
//! registrations move down as directories appear.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use cartsync_config::UploadConfig;
use cartsync_config::paths::project_settings_path;
use cartsync_core::WorkspaceFolder;
use cartsync_session::{FsWatcher, ManagerEvent, existing_ancestor, is_content_change};
use notify::{Event, EventKind, RecursiveMode};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Settings files that feed a folder snapshot: the user file, then one
/// overlay per `file` folder.
pub(crate) fn settings_paths(user: Option<&Path>, folders: &[WorkspaceFolder]) -> Vec<PathBuf> {
    user.map(Path::to_path_buf)
        .into_iter()
        .chain(
            folders
                .iter()
                .filter(|f| f.is_file())
                .map(|f| project_settings_path(f.path())),
        )
        .collect()
}

pub(crate) fn config_paths(folders: &[WorkspaceFolder]) -> Vec<PathBuf> {
    folders
        .iter()
        .filter(|f| f.is_file())
        .map(|f| UploadConfig::config_path(f.path()))
        .collect()
}

/// Which manager events a batch of file notifications calls for.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Pending {
    settings: bool,
    config: bool,
}

impl Pending {
    fn everything() -> Self {
        Self {
            settings: true,
            config: true,
        }
    }

    fn merge(&mut self, other: Pending) {
        self.settings |= other.settings;
        self.config |= other.config;
    }

    fn is_empty(&self) -> bool {
        !self.settings && !self.config
    }

    /// Settings before config, so a reload sees the new settings first.
    fn drain(&mut self) -> Vec<ManagerEvent> {
        let mut events = Vec::new();
        if std::mem::take(&mut self.settings) {
            events.push(ManagerEvent::SettingsChanged);
        }
        if std::mem::take(&mut self.config) {
            events.push(ManagerEvent::ConfigChanged);
        }
        events
    }
}

/// The files whose edits are reported to the manager.
#[derive(Debug, Default)]
pub(crate) struct WatchTargets {
    settings: BTreeSet<PathBuf>,
    config: BTreeSet<PathBuf>,
}

impl WatchTargets {
    pub(crate) fn new(user: Option<&Path>, folders: &[WorkspaceFolder]) -> Self {
        Self {
            settings: settings_paths(user, folders).into_iter().collect(),
            config: config_paths(folders).into_iter().collect(),
        }
    }

    fn all(&self) -> impl Iterator<Item = &PathBuf> {
        self.settings.iter().chain(self.config.iter())
    }

    /// Nearest existing directory above each target.
    pub(crate) fn directories(&self) -> BTreeSet<PathBuf> {
        self.all()
            .filter_map(|target| target.parent())
            .filter_map(existing_ancestor)
            .collect()
    }

    pub(crate) fn classify(&self, event: &Event) -> Pending {
        if matches!(event.kind, EventKind::Any | EventKind::Other) || event.need_rescan() {
            return Pending::everything();
        }
        if !is_content_change(&event.kind) {
            return Pending::default();
        }
        let mut pending = Pending::default();
        for path in &event.paths {
            pending.settings |= self.settings.contains(path);
            pending.config |= self.config.contains(path);
        }
        pending
    }

    /// Whether the event created or removed a directory on the way to a
    /// target, so the registrations need to move.
    pub(crate) fn touches_ancestor(&self, event: &Event) -> bool {
        event.paths.iter().any(|path| {
            self.all()
                .any(|target| target != path && target.starts_with(path))
        })
    }

    /// Targets that already exist below newly watched directories. Their
    /// creation may have happened before the watch was in place.
    pub(crate) fn existing_under(&self, added: &[PathBuf]) -> Pending {
        let present = |targets: &BTreeSet<PathBuf>| {
            targets
                .iter()
                .any(|target| target.is_file() && added.iter().any(|dir| target.starts_with(dir)))
        };
        Pending {
            settings: present(&self.settings),
            config: present(&self.config),
        }
    }
}

/// Reports settings and upload config edits to the session manager.
pub(crate) struct ConfigWatcher {
    watcher: FsWatcher,
    targets: WatchTargets,
    folders: watch::Receiver<Vec<WorkspaceFolder>>,
    user_settings: Option<PathBuf>,
}

impl ConfigWatcher {
    /// Registers the watches immediately, so edits made before [`run`]
    /// starts are still reported.
    ///
    /// [`run`]: ConfigWatcher::run
    pub(crate) fn new(
        mut folders: watch::Receiver<Vec<WorkspaceFolder>>,
        user_settings: Option<PathBuf>,
    ) -> Result<Self> {
        let mut watcher = FsWatcher::new(RecursiveMode::NonRecursive)?;
        let targets = WatchTargets::new(user_settings.as_deref(), &folders.borrow_and_update());
        watcher.sync(&targets.directories());
        Ok(Self {
            watcher,
            targets,
            folders,
            user_settings,
        })
    }

    /// Forward changes once they have been quiet for `debounce`. Returns
    /// when cancelled or when the manager goes away.
    pub(crate) async fn run(
        mut self,
        debounce: Duration,
        events: mpsc::Sender<ManagerEvent>,
        cancel: CancellationToken,
    ) {
        let mut pending = Pending::default();
        let mut folders_open = true;
        let settle = tokio::time::sleep(debounce);
        tokio::pin!(settle);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                () = &mut settle, if !pending.is_empty() => {
                    for event in pending.drain() {
                        tracing::debug!(event = ?event, "watched file changed");
                        if events.send(event).await.is_err() {
                            return;
                        }
                    }
                }
                changed = self.folders.changed(), if folders_open => match changed {
                    Ok(()) => {
                        self.targets = WatchTargets::new(
                            self.user_settings.as_deref(),
                            &self.folders.borrow_and_update(),
                        );
                        self.watcher.sync(&self.targets.directories());
                    }
                    Err(_) => folders_open = false,
                },
                event = self.watcher.next() => {
                    let Some(event) = event else {
                        tracing::warn!("config file watcher stopped");
                        return;
                    };
                    let found = self.observe(event);
                    if !found.is_empty() {
                        pending.merge(found);
                        settle.as_mut().reset(Instant::now() + debounce);
                    }
                }
            }
        }
    }

    fn observe(&mut self, event: notify::Result<Event>) -> Pending {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "config file watcher error, reloading everything");
                return Pending::everything();
            }
        };
        let mut found = self.targets.classify(&event);
        if self.targets.touches_ancestor(&event) {
            let added = self.watcher.sync(&self.targets.directories());
            found.merge(self.targets.existing_under(&added));
        }
        found
    }
}
