//! Upload config document (`dw.json`).
//!
//! The document describes the sandbox (host, credentials, code version),
//! an optional cartridge allow-list and an optional conflict resolution
//! preference. The first `file`-scheme workspace folder that holds a
//! `dw.json` provides the whole document.

use anyhow::{Context, Result};
use cartsync_core::{CartridgeResolution, WorkspaceFolder};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

pub const UPLOAD_CONFIG_FILE: &str = "dw.json";

const DEFAULT_CODE_VERSION: &str = "version1";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(
        default,
        rename = "code-version",
        alias = "codeVersion",
        skip_serializing_if = "Option::is_none"
    )]
    pub code_version: Option<String>,
    /// Allow-list of cartridge names, in upload order. Accepts a JSON array
    /// or a `:`-separated cartridge path string.
    #[serde(
        default,
        deserialize_with = "deserialize_cartridge_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub cartridge: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cartridge_resolution: Option<CartridgeResolution>,
    /// File the document was read from; None for the default document.
    #[serde(skip)]
    pub config_filename: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CartridgeList {
    Names(Vec<String>),
    Path(String),
}

fn deserialize_cartridge_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<CartridgeList>::deserialize(deserializer)?;
    Ok(raw.map(|list| match list {
        CartridgeList::Names(names) => names,
        CartridgeList::Path(path) => path
            .split(':')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
    }))
}

impl UploadConfig {
    /// Load the document from the first folder that has one.
    ///
    /// A missing document is not an error: the default document (no
    /// allow-list, no resolution preference) is returned.
    pub fn load(folders: &[WorkspaceFolder]) -> Result<Self> {
        for folder in folders.iter().filter(|f| f.is_file()) {
            let path = Self::config_path(folder.path());
            if path.is_file() {
                return Self::load_from_path(&path);
            }
        }
        tracing::debug!(
            folders = folders.len(),
            "no {UPLOAD_CONFIG_FILE} found, using default upload config"
        );
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read upload config: {}", path.display()))?;
        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse upload config: {}", path.display()))?;
        config.config_filename = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn config_path(folder: &Path) -> PathBuf {
        folder.join(UPLOAD_CONFIG_FILE)
    }

    /// Allow-list, or None when absent or empty.
    pub fn allow_list(&self) -> Option<&[String]> {
        self.cartridge.as_deref().filter(|names| !names.is_empty())
    }

    pub fn code_version_or_default(&self) -> &str {
        self.code_version
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(DEFAULT_CODE_VERSION)
    }

    /// Display name of the source document for log lines.
    pub fn display_name(&self) -> String {
        match &self.config_filename {
            Some(path) => path.display().to_string(),
            None => "<default>".to_string(),
        }
    }

    /// Copy safe to print: the password is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.password.is_some() {
            copy.password = Some("********".to_string());
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_config(dir: &Path, content: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(UPLOAD_CONFIG_FILE), content).unwrap();
    }

    #[test]
    fn test_missing_document_returns_default() {
        let dir = tempdir().unwrap();
        let config = UploadConfig::load(&[WorkspaceFolder::file(dir.path())]).unwrap();
        assert_eq!(config, UploadConfig::default());
        assert!(config.allow_list().is_none());
        assert!(config.cartridge_resolution.is_none());
        assert_eq!(config.display_name(), "<default>");
    }

    #[test]
    fn test_parses_full_document() {
        let dir = tempdir().unwrap();
        write_config(
            dir.path(),
            r#"{
                "hostname": "dev01.sandbox.example.com",
                "username": "builder",
                "password": "s3cret",
                "code-version": "v42",
                "cartridge": ["app_custom", "app_storefront_base"],
                "cartridgeResolution": "remove"
            }"#,
        );

        let config = UploadConfig::load(&[WorkspaceFolder::file(dir.path())]).unwrap();
        assert_eq!(
            config.hostname.as_deref(),
            Some("dev01.sandbox.example.com")
        );
        assert_eq!(config.code_version_or_default(), "v42");
        assert_eq!(
            config.allow_list().unwrap(),
            &["app_custom".to_string(), "app_storefront_base".to_string()]
        );
        assert_eq!(
            config.cartridge_resolution,
            Some(CartridgeResolution::Remove)
        );
        assert_eq!(
            config.config_filename.as_deref(),
            Some(dir.path().join(UPLOAD_CONFIG_FILE).as_path())
        );
    }

    #[test]
    fn test_cartridge_path_string_is_split() {
        let dir = tempdir().unwrap();
        write_config(
            dir.path(),
            r#"{ "cartridge": "app_custom: int_payments::app_storefront_base" }"#,
        );
        let config = UploadConfig::load(&[WorkspaceFolder::file(dir.path())]).unwrap();
        assert_eq!(
            config.cartridge.unwrap(),
            vec!["app_custom", "int_payments", "app_storefront_base"]
        );
    }

    #[test]
    fn test_empty_allow_list_is_treated_as_absent() {
        let dir = tempdir().unwrap();
        write_config(dir.path(), r#"{ "cartridge": [] }"#);
        let config = UploadConfig::load(&[WorkspaceFolder::file(dir.path())]).unwrap();
        assert!(config.allow_list().is_none());
    }

    #[test]
    fn test_first_folder_with_document_wins() {
        let dir = tempdir().unwrap();
        let empty = dir.path().join("empty");
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        std::fs::create_dir_all(&empty).unwrap();
        write_config(&first, r#"{ "hostname": "first" }"#);
        write_config(&second, r#"{ "hostname": "second" }"#);

        let config = UploadConfig::load(&[
            WorkspaceFolder::file(&empty),
            WorkspaceFolder::file(&first),
            WorkspaceFolder::file(&second),
        ])
        .unwrap();
        assert_eq!(config.hostname.as_deref(), Some("first"));
    }

    #[test]
    fn test_non_file_folders_are_skipped() {
        let dir = tempdir().unwrap();
        write_config(dir.path(), r#"{ "hostname": "local" }"#);
        let remote = WorkspaceFolder::parse(&format!("ssh://{}", dir.path().display()));

        let config = UploadConfig::load(&[remote]).unwrap();
        assert_eq!(config, UploadConfig::default());
    }

    #[test]
    fn test_invalid_resolution_is_an_error() {
        let dir = tempdir().unwrap();
        write_config(dir.path(), r#"{ "cartridgeResolution": "purge" }"#);
        let err = UploadConfig::load(&[WorkspaceFolder::file(dir.path())]).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse upload config"));
    }

    #[test]
    fn test_redacted_masks_password() {
        let config = UploadConfig {
            password: Some("s3cret".into()),
            ..Default::default()
        };
        let shown = serde_json::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("s3cret"));
        assert!(shown.contains("********"));
    }

    #[test]
    fn test_code_version_defaults() {
        assert_eq!(UploadConfig::default().code_version_or_default(), "version1");
    }
}
