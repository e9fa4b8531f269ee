use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Scheme of workspace folders that live on the local filesystem.
pub const FILE_SCHEME: &str = "file";

/// A workspace root folder. Identity is the (scheme, path) pair.
///
/// Only `file`-scheme folders take part in cartridge resolution and config
/// loading; other schemes are kept in the snapshot so that folder-change
/// events stay faithful to what the host reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceFolder {
    scheme: String,
    path: PathBuf,
}

impl WorkspaceFolder {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            scheme: FILE_SCHEME.to_string(),
            path: path.into(),
        }
    }

    /// Parse either a plain path or a `scheme://path` URI.
    ///
    /// `file:///abs/path` yields the `file` scheme with `/abs/path`.
    pub fn parse(input: &str) -> Self {
        match input.split_once("://") {
            Some((scheme, rest))
                if !scheme.is_empty()
                    && scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
            {
                Self {
                    scheme: scheme.to_ascii_lowercase(),
                    path: PathBuf::from(rest),
                }
            }
            _ => Self::file(input),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_file(&self) -> bool {
        self.scheme == FILE_SCHEME
    }

    /// Error out for folders that cannot be read from the local filesystem.
    pub fn require_file(&self) -> Result<&Path, SyncError> {
        if self.is_file() {
            Ok(&self.path)
        } else {
            Err(SyncError::UnsupportedScheme(self.scheme.clone()))
        }
    }
}

impl fmt::Display for WorkspaceFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_file() {
            write!(f, "{}", self.path.display())
        } else {
            write!(f, "{}://{}", self.scheme, self.path.display())
        }
    }
}

/// A cartridge directory and its derived name (the directory basename).
///
/// Two cartridges from different workspace folders may share a name; the
/// deduplicator decides which one ships.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cartridge {
    path: PathBuf,
    name: String,
}

impl Cartridge {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Process-wide upload commands broadcast to every session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandEvent {
    EnableUpload,
    CleanUpload,
    DisableUpload,
}

impl CommandEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnableUpload => "enable.upload",
            Self::CleanUpload => "clean.upload",
            Self::DisableUpload => "disable.upload",
        }
    }
}

impl fmt::Display for CommandEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommandEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "enable" | "enable.upload" | "enable-upload" => Ok(Self::EnableUpload),
            "clean" | "clean.upload" | "clean-upload" => Ok(Self::CleanUpload),
            "disable" | "disable.upload" | "disable-upload" => Ok(Self::DisableUpload),
            other => Err(format!(
                "Unknown command '{other}'. Valid values: enable-upload, clean-upload, disable-upload"
            )),
        }
    }
}

/// What to do with remote cartridges that have no local counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartridgeResolution {
    Remove,
    Leave,
}

impl CartridgeResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remove => "remove",
            Self::Leave => "leave",
        }
    }
}

impl std::str::FromStr for CartridgeResolution {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remove" => Ok(Self::Remove),
            "leave" => Ok(Self::Leave),
            _ => Err(SyncError::InvalidResolution(s.to_string())),
        }
    }
}

impl fmt::Display for CartridgeResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sticky conflict policy. Starts `Unset`; once resolved it stays resolved
/// for the rest of the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    #[default]
    Unset,
    Resolved(CartridgeResolution),
}

impl ConflictPolicy {
    pub fn resolution(&self) -> Option<CartridgeResolution> {
        match self {
            Self::Unset => None,
            Self::Resolved(resolution) => Some(*resolution),
        }
    }
}
