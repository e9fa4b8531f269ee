use std::path::PathBuf;

use anyhow::Result;
use cartsync_config::{Settings, UploadConfig, paths, validate_settings};
use cartsync_core::WorkspaceFolder;
use tracing::warn;

fn file_folder_paths(folders: &[WorkspaceFolder]) -> Vec<PathBuf> {
    folders
        .iter()
        .filter(|f| f.is_file())
        .map(|f| f.path().to_path_buf())
        .collect()
}

pub(crate) fn handle_config_show(folders: Vec<WorkspaceFolder>) -> Result<()> {
    let settings = Settings::load(&file_folder_paths(&folders))?;
    let config = UploadConfig::load(&folders)?;

    println!("# settings (merged)");
    print!("{}", toml::to_string_pretty(&settings)?);
    println!();
    println!("# upload config: {}", config.display_name());
    println!("{}", serde_json::to_string_pretty(&config.redacted())?);
    Ok(())
}

pub(crate) fn handle_config_init(force: bool) -> Result<()> {
    let Some(path) = paths::user_settings_path() else {
        anyhow::bail!("Cannot determine the user config directory (is HOME set?)");
    };
    if path.exists() && !force {
        eprintln!(
            "Settings already exist at {} (use --force to overwrite)",
            path.display()
        );
        return Ok(());
    }
    match Settings::save_user_template()? {
        Some(written) => eprintln!("Wrote settings template to {}", written.display()),
        None => warn!("User config directory disappeared while writing the template"),
    }
    Ok(())
}

pub(crate) fn handle_config_validate(folders: Vec<WorkspaceFolder>) -> Result<()> {
    let settings = Settings::load(&file_folder_paths(&folders))?;
    validate_settings(&settings)?;
    let config = UploadConfig::load(&folders)?;
    eprintln!("Settings OK");
    eprintln!("Upload config OK: {}", config.display_name());
    Ok(())
}
