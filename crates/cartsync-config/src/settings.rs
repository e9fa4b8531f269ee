//! Process settings (`settings.toml`).
//!
//! Layering, lowest to highest priority:
//! 1. built-in defaults
//! 2. user settings `~/.config/cartsync/settings.toml`
//! 3. workspace settings `{folder}/.cartsync/settings.toml`, where earlier
//!    workspace folders win over later ones
//!
//! Tables are deep-merged; scalar and array values from the higher layer
//! replace the lower one.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths;
use crate::settings_merge::{merge_toml_values, warn_unknown_upload_keys};

/// Default regex exclusions applied to uploaded file paths.
pub const DEFAULT_IGNORE_LIST: &[&str] = &["node_modules", "\\.git", "\\.zip$"];

const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Longest accepted debounce window.
pub const MAX_DEBOUNCE_MS: u64 = 60_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub upload: UploadSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSettings {
    /// Master switch for the uploader.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Clean remote cartridges on the first session start of the process.
    #[serde(default = "default_true")]
    pub clean_on_start: bool,
    #[serde(default = "default_ignore_list")]
    pub ignore_list: Vec<String>,
    /// Quiet period after a file change before it is acted on. Editors
    /// usually emit several events per save.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            clean_on_start: true,
            ignore_list: default_ignore_list(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ignore_list() -> Vec<String> {
    DEFAULT_IGNORE_LIST.iter().map(|s| s.to_string()).collect()
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

impl Settings {
    /// Load layered settings for the given workspace folder paths.
    pub fn load(folders: &[PathBuf]) -> Result<Self> {
        let user_path = paths::user_settings_path();
        let overlays: Vec<PathBuf> = folders
            .iter()
            .map(|folder| paths::project_settings_path(folder))
            .collect();
        Self::load_with_paths(user_path.as_deref(), &overlays)
    }

    /// Load from explicit paths. Testable without global filesystem state.
    ///
    /// `overlays` are in priority order: the first entry wins.
    pub fn load_with_paths(user_path: Option<&Path>, overlays: &[PathBuf]) -> Result<Self> {
        let mut merged: Option<toml::Value> = None;

        let layers = user_path
            .into_iter()
            .chain(overlays.iter().rev().map(PathBuf::as_path));
        for path in layers {
            let Some(value) = read_layer(path)? else {
                continue;
            };
            merged = Some(match merged {
                Some(base) => merge_toml_values(base, value),
                None => value,
            });
        }

        let Some(merged) = merged else {
            return Ok(Self::default());
        };

        // Roundtrip through string for reliable deserialization
        let merged_str = toml::to_string(&merged).context("Failed to serialize merged settings")?;
        toml::from_str(&merged_str).context("Failed to deserialize merged settings")
    }

    /// Every file that contributes to [`Settings::load`], existing or not.
    pub fn watched_paths(folders: &[PathBuf]) -> Vec<PathBuf> {
        paths::user_settings_path()
            .into_iter()
            .chain(folders.iter().map(|f| paths::project_settings_path(f)))
            .collect()
    }

    /// Write the user-level template. Returns the path written, or None if
    /// the config directory cannot be determined.
    pub fn save_user_template() -> Result<Option<PathBuf>> {
        let Some(path) = paths::user_settings_path() else {
            return Ok(None);
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(&path, Self::user_template())
            .with_context(|| format!("Failed to write settings template: {}", path.display()))?;
        Ok(Some(path))
    }

    /// Commented template for the user settings file.
    pub fn user_template() -> String {
        r#"# cartsync user settings
# Location: ~/.config/cartsync/settings.toml
#
# Workspace folders may override any key in {folder}/.cartsync/settings.toml.

[upload]
# Start uploading as soon as `cartsync watch` runs.
enabled = true
# Clean remote cartridges on the first start of each process.
# An explicit `clean` command makes every later restart clean as well.
clean_on_start = true
# Regular expressions matched against each file path relative to its cartridge.
ignore_list = ["node_modules", "\\.git", "\\.zip$"]
# Milliseconds to wait for file changes to settle before syncing them.
debounce_ms = 300
"#
        .to_string()
    }
}

fn read_layer(path: &Path) -> Result<Option<toml::Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings: {}", path.display()))?;
    let value: toml::Value = toml::from_str(&content)
        .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
    warn_unknown_upload_keys(&value, &path.display().to_string());
    Ok(Some(value))
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
