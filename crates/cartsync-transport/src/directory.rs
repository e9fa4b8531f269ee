//! Transport that mirrors cartridges into a sandbox directory.
//!
//! Layout: `<sandbox_root>/<code-version>/<cartridge name>/...`. The sandbox
//! root must already exist; the version directory is created on demand.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use cartsync_config::{UploadConfig, compile_ignore_list};
use cartsync_core::SyncError;
use cartsync_session::{
    CleanupAdvisor, FsWatcher, LogSurface, Transport, UploadOptions, UploadSession,
    is_content_change,
};
use notify::{Event, EventKind, RecursiveMode};
use regex::Regex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::mirror::{self, MirrorStats};

#[derive(Debug, Clone)]
pub struct DirectoryTransport {
    sandbox_root: PathBuf,
}

impl DirectoryTransport {
    pub fn new(sandbox_root: impl Into<PathBuf>) -> Self {
        Self {
            sandbox_root: sandbox_root.into(),
        }
    }

    pub fn sandbox_root(&self) -> &Path {
        &self.sandbox_root
    }
}

/// Inputs shared by the initial sync and the watch loop.
struct MirrorJob {
    cartridges: Vec<PathBuf>,
    version_dir: PathBuf,
    ignore: Arc<Vec<Regex>>,
}

impl MirrorJob {
    async fn run(&self, cartridges: Vec<PathBuf>) -> Result<MirrorStats> {
        let version_dir = self.version_dir.clone();
        let ignore = Arc::clone(&self.ignore);
        tokio::task::spawn_blocking(move || mirror::mirror_all(&cartridges, &version_dir, &ignore))
            .await
            .context("mirror task failed")?
    }

    /// Cartridge directories that currently exist and can be watched.
    fn watch_roots(&self) -> BTreeSet<PathBuf> {
        self.cartridges
            .iter()
            .filter(|c| c.is_dir())
            .cloned()
            .collect()
    }

    /// Cartridges that need another pass after `event`.
    fn dirty_cartridges(&self, event: notify::Result<Event>) -> Vec<PathBuf> {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "file watcher error, resyncing all cartridges");
                return self.cartridges.clone();
            }
        };
        if matches!(event.kind, EventKind::Any | EventKind::Other) || event.need_rescan() {
            return self.cartridges.clone();
        }
        if !is_content_change(&event.kind) {
            return Vec::new();
        }
        self.cartridges
            .iter()
            .filter(|cartridge| {
                event.paths.iter().any(|path| {
                    path.starts_with(cartridge) && !mirror::is_ignored(cartridge, path, &self.ignore)
                })
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for DirectoryTransport {
    async fn init(
        &self,
        config: UploadConfig,
        log: Arc<dyn LogSurface>,
        options: UploadOptions,
        advisor: Arc<dyn CleanupAdvisor>,
    ) -> Result<Box<dyn UploadSession>> {
        if !self.sandbox_root.is_dir() {
            return Err(SyncError::TargetUnavailable(self.sandbox_root.display().to_string()).into());
        }
        let code_version = config.code_version_or_default();
        if mirror::check_remote_name(code_version).is_err() {
            return Err(SyncError::UnsafeCodeVersion(code_version.to_string()).into());
        }
        let ignore = compile_ignore_list(&options.ignore_list)?;
        let version_dir = self.sandbox_root.join(code_version);
        tokio::fs::create_dir_all(&version_dir)
            .await
            .with_context(|| format!("Failed to create {}", version_dir.display()))?;

        let cartridges: Vec<PathBuf> = config
            .cartridge
            .unwrap_or_default()
            .into_iter()
            .map(PathBuf::from)
            .collect();
        log.info(&format!(
            "Uploading {} cartridge(s) to {}",
            cartridges.len(),
            version_dir.display()
        ));

        if options.clean_on_start {
            clean_remote(&version_dir, &cartridges, advisor.as_ref(), log.as_ref()).await?;
        }

        let job = MirrorJob {
            cartridges,
            version_dir,
            ignore: Arc::new(ignore),
        };
        // Register before the initial pass so edits made during it are seen.
        let mut watcher = FsWatcher::new(RecursiveMode::Recursive)?;
        watcher.sync(&job.watch_roots());

        let stats = job.run(job.cartridges.clone()).await?;
        log.info(&format!(
            "Initial upload done: {} file(s) copied, {} unchanged",
            stats.copied, stats.unchanged
        ));

        let cancel = CancellationToken::new();
        let task = tokio::spawn(watch_loop(
            job,
            watcher,
            options.debounce,
            log,
            cancel.clone(),
        ));
        Ok(Box::new(DirectorySession {
            cancel,
            task: Some(task),
        }))
    }
}

async fn clean_remote(
    version_dir: &Path,
    cartridges: &[PathBuf],
    advisor: &dyn CleanupAdvisor,
    log: &dyn LogSurface,
) -> Result<()> {
    let listing_dir = version_dir.to_path_buf();
    let remote = tokio::task::spawn_blocking(move || mirror::list_remote(&listing_dir))
        .await
        .context("sandbox listing task failed")??;
    let local: Vec<String> = cartridges
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();

    let doomed = advisor.ask_clean_cartridge(&remote, &local).await;
    for name in doomed {
        if let Err(e) = mirror::check_remote_name(&name) {
            log.warn(&e.to_string());
            continue;
        }
        let dir = version_dir.to_path_buf();
        let target = name.clone();
        let deleted = tokio::task::spawn_blocking(move || mirror::delete_remote(&dir, &target))
            .await
            .context("sandbox delete task failed")?;
        match deleted {
            Ok(()) => log.info(&format!("Removed remote cartridge '{name}'")),
            Err(e) => log.warn(&format!("{e:#}")),
        }
    }
    Ok(())
}

/// Upload changed cartridges once their edits have been quiet for
/// `debounce`.
async fn watch_loop(
    job: MirrorJob,
    mut watcher: FsWatcher,
    debounce: Duration,
    log: Arc<dyn LogSurface>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut dirty: BTreeSet<PathBuf> = BTreeSet::new();
    let settle = tokio::time::sleep(debounce);
    tokio::pin!(settle);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            () = &mut settle, if !dirty.is_empty() => {
                let batch: Vec<PathBuf> = std::mem::take(&mut dirty).into_iter().collect();
                let stats = job.run(batch).await?;
                if stats.copied > 0 {
                    log.info(&format!("Uploaded {} changed file(s)", stats.copied));
                }
                // Cartridge directories that were deleted and recreated need
                // a fresh registration.
                watcher.sync(&job.watch_roots());
            }
            event = watcher.next() => {
                let Some(event) = event else {
                    return Err(anyhow!("file watcher stopped unexpectedly"));
                };
                let touched = job.dirty_cartridges(event);
                if !touched.is_empty() {
                    dirty.extend(touched);
                    settle.as_mut().reset(Instant::now() + debounce);
                }
            }
        }
    }
}

/// Handle for a running [`DirectoryTransport`] session. Dropping it stops
/// the watch loop.
pub struct DirectorySession {
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<()>>>,
}

#[async_trait]
impl UploadSession for DirectorySession {
    fn stop(&mut self) {
        self.cancel.cancel();
    }

    async fn closed(&mut self) -> Result<()> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let joined = task.await;
        self.task = None;
        match joined {
            Ok(result) => result,
            Err(e) => Err(anyhow!(e).context("upload watch task failed")),
        }
    }
}

impl Drop for DirectorySession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "directory_tests.rs"]
mod tests;
