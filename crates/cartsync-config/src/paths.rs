use std::path::{Path, PathBuf};

/// XDG app name used for config and state directories.
pub const APP_NAME: &str = "cartsync";

/// Per-workspace directory holding cartsync files (`{folder}/.cartsync`).
pub const PROJECT_DIR_NAME: &str = ".cartsync";

pub const SETTINGS_FILE_NAME: &str = "settings.toml";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// User config directory (`~/.config/cartsync`).
///
/// None when the home directory cannot be determined (e.g., containers
/// without HOME).
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// State directory. `state_dir()` is Linux-only; other platforms fall back
/// to the local data dir.
pub fn state_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| {
        dirs.state_dir()
            .unwrap_or_else(|| dirs.data_local_dir())
            .to_path_buf()
    })
}

pub fn state_dir_fallback() -> PathBuf {
    std::env::temp_dir().join(format!("{APP_NAME}-state"))
}

/// Directory for the process-lifetime output log.
pub fn log_dir() -> PathBuf {
    state_dir()
        .unwrap_or_else(state_dir_fallback)
        .join("logs")
}

pub fn user_settings_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(SETTINGS_FILE_NAME))
}

pub fn project_settings_path(folder: &Path) -> PathBuf {
    folder.join(PROJECT_DIR_NAME).join(SETTINGS_FILE_NAME)
}

/// Optional per-project cartridge ordering file.
pub fn cartridge_order_path(folder: &Path) -> PathBuf {
    folder.join(PROJECT_DIR_NAME).join("cartridges.toml")
}
