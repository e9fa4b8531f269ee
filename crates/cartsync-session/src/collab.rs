//! Interfaces of the external collaborators the engine drives.
//!
//! The host shell, the remote filesystem and the upload transport live
//! behind these traits so the engine can be exercised with in-memory fakes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use cartsync_config::{Settings, UploadConfig, validate_settings};
use cartsync_core::WorkspaceFolder;

use crate::log::LogSurface;

/// Enumerates cartridge directories below one workspace folder.
///
/// Best effort: an unreadable folder yields fewer (or no) paths, never an
/// error.
#[async_trait]
pub trait CartridgeResolver: Send + Sync {
    async fn resolve(&self, folder: &WorkspaceFolder) -> Vec<PathBuf>;
}

/// Loads the merged upload config document for a folder snapshot.
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    async fn load(&self, folders: &[WorkspaceFolder]) -> Result<UploadConfig>;
}

/// Reads the current process settings (enabled flag, clean-on-start, ignore list).
pub trait SettingsProvider: Send + Sync {
    fn settings(&self, folders: &[WorkspaceFolder]) -> Result<Settings>;
}

/// Answers offered when the remote has cartridges the workspace lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptChoice {
    RemoveAllAlways,
    LeaveAllAlways,
    RemoveAll,
    LeaveAll,
}

impl PromptChoice {
    pub const ALL: [PromptChoice; 4] = [
        Self::RemoveAllAlways,
        Self::LeaveAllAlways,
        Self::RemoveAll,
        Self::LeaveAll,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::RemoveAllAlways => "Remove All Always",
            Self::LeaveAllAlways => "Leave All Always",
            Self::RemoveAll => "Remove All",
            Self::LeaveAll => "Leave All",
        }
    }

    /// Match a label case-insensitively, ignoring surrounding whitespace.
    pub fn from_label(input: &str) -> Option<Self> {
        let input = input.trim();
        Self::ALL
            .into_iter()
            .find(|choice| choice.label().eq_ignore_ascii_case(input))
    }
}

/// Interactive prompt owned by the host. `None` means the user dismissed it.
#[async_trait]
pub trait UserPrompt: Send + Sync {
    async fn choose(&self, message: &str, choices: &[PromptChoice]) -> Option<PromptChoice>;
}

/// Callback handed to the transport. Invoked once the transport has
/// enumerated the remote inventory; returns the remote names to delete.
#[async_trait]
pub trait CleanupAdvisor: Send + Sync {
    async fn ask_clean_cartridge(&self, remote: &[String], local: &[String]) -> Vec<String>;
}

/// Options passed alongside the resolved config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub clean_on_start: bool,
    pub ignore_list: Vec<String>,
    /// Quiet period before local edits are uploaded.
    pub debounce: Duration,
}

/// A running upload. Dropping it must stop it as well.
#[async_trait]
pub trait UploadSession: Send {
    /// Signal the transport to stop. Does not wait for it to finish.
    fn stop(&mut self);

    /// Resolves when the transport ends on its own, with its failure if any.
    async fn closed(&mut self) -> Result<()>;
}

/// The upload transport. `config.cartridge` holds the absolute paths of the
/// final cartridge set, in upload order.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn init(
        &self,
        config: UploadConfig,
        log: Arc<dyn LogSurface>,
        options: UploadOptions,
        advisor: Arc<dyn CleanupAdvisor>,
    ) -> Result<Box<dyn UploadSession>>;
}

/// [`ConfigLoader`] reading `dw.json` from the workspace folders.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkspaceConfigLoader;

#[async_trait]
impl ConfigLoader for WorkspaceConfigLoader {
    async fn load(&self, folders: &[WorkspaceFolder]) -> Result<UploadConfig> {
        let folders = folders.to_vec();
        tokio::task::spawn_blocking(move || UploadConfig::load(&folders))
            .await
            .context("upload config loader task failed")?
    }
}

/// [`SettingsProvider`] backed by the layered `settings.toml` files.
#[derive(Debug, Clone)]
pub struct FileSettingsProvider {
    user_path: Option<PathBuf>,
}

impl FileSettingsProvider {
    /// Uses the user settings file under the XDG config directory.
    pub fn new() -> Self {
        Self {
            user_path: cartsync_config::paths::user_settings_path(),
        }
    }

    pub fn with_user_path(user_path: Option<PathBuf>) -> Self {
        Self { user_path }
    }
}

impl Default for FileSettingsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsProvider for FileSettingsProvider {
    fn settings(&self, folders: &[WorkspaceFolder]) -> Result<Settings> {
        let overlays: Vec<PathBuf> = folders
            .iter()
            .filter(|f| f.is_file())
            .map(|f| cartsync_config::paths::project_settings_path(f.path()))
            .collect();
        let settings = Settings::load_with_paths(self.user_path.as_deref(), &overlays)?;
        validate_settings(&settings)?;
        Ok(settings)
    }
}
