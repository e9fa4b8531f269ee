//! Filesystem cartridge discovery.
//!
//! A cartridge is a directory holding a `.project` file. Discovery walks a
//! workspace folder in file-name order and never descends into a cartridge,
//! `node_modules` or `.git`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cartsync_core::WorkspaceFolder;
use ignore::WalkBuilder;
use serde::Deserialize;

use crate::collab::CartridgeResolver;

const PROJECT_MARKER: &str = ".project";
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git"];

/// Per-project ordering metadata (`.cartsync/cartridges.toml`).
#[derive(Debug, Default, Deserialize)]
struct CartridgeOrder {
    #[serde(default)]
    order: Vec<String>,
}

/// [`CartridgeResolver`] backed by [`discover_cartridges`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjectFileResolver;

#[async_trait]
impl CartridgeResolver for ProjectFileResolver {
    async fn resolve(&self, folder: &WorkspaceFolder) -> Vec<PathBuf> {
        let root = match folder.require_file() {
            Ok(path) => path.to_path_buf(),
            Err(e) => {
                tracing::debug!(folder = %folder, error = %e, "not resolving cartridges");
                return Vec::new();
            }
        };
        match tokio::task::spawn_blocking(move || discover_cartridges(&root)).await {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!(folder = %folder, error = %e, "cartridge discovery task failed");
                Vec::new()
            }
        }
    }
}

/// Enumerate cartridge directories under `root`, best effort.
///
/// An unreadable entry ends the walk; whatever was found so far is returned.
/// Ordering metadata, when present, moves the named cartridges to the front.
pub fn discover_cartridges(root: &Path) -> Vec<PathBuf> {
    let mut builder = WalkBuilder::new(root);
    builder.standard_filters(false);
    builder.sort_by_file_name(|a, b| a.cmp(b));
    builder.filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        let name = entry.file_name();
        if SKIPPED_DIRS.iter().any(|skipped| name == *skipped) {
            return false;
        }
        // Contents of a cartridge are never searched for nested cartridges.
        !entry
            .path()
            .parent()
            .is_some_and(|parent| parent.join(PROJECT_MARKER).is_file())
    });

    let mut found = Vec::new();
    for result in builder.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(
                    root = %root.display(),
                    error = %e,
                    "cartridge walk stopped early"
                );
                break;
            }
        };
        let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
        if is_dir && entry.path().join(PROJECT_MARKER).is_file() {
            found.push(entry.into_path());
        }
    }

    match load_order(root) {
        Some(order) => apply_order(found, &order),
        None => found,
    }
}

fn load_order(root: &Path) -> Option<Vec<String>> {
    let path = cartsync_config::paths::cartridge_order_path(root);
    let content = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<CartridgeOrder>(&content) {
        Ok(parsed) => Some(parsed.order),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "ignoring unparseable cartridge order file"
            );
            None
        }
    }
}

/// Named cartridges first, in `order`; the rest keep discovery order.
fn apply_order(mut found: Vec<PathBuf>, order: &[String]) -> Vec<PathBuf> {
    let mut ordered = Vec::with_capacity(found.len());
    for name in order {
        let position = found
            .iter()
            .position(|path| path.file_name().is_some_and(|n| n == name.as_str()));
        if let Some(index) = position {
            ordered.push(found.remove(index));
        }
    }
    ordered.extend(found);
    ordered
}
