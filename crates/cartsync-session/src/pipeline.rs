use cartsync_config::UploadConfig;
use cartsync_core::{Cartridge, WorkspaceFolder};

use crate::allow_list::apply_allow_list;
use crate::collab::CartridgeResolver;
use crate::dedup::remove_duplicates;
use crate::log::LogSurface;

/// Resolve the final, ordered cartridge set for a folder snapshot.
///
/// Folders are resolved in order (non-`file` folders are skipped), then
/// duplicates are dropped and the config allow-list is applied. Warnings go
/// to `log`; nothing here fails.
pub async fn resolve_cartridge_set(
    folders: &[WorkspaceFolder],
    resolver: &dyn CartridgeResolver,
    config: &UploadConfig,
    log: &dyn LogSurface,
) -> Vec<Cartridge> {
    let mut raw = Vec::new();
    for folder in folders {
        if !folder.is_file() {
            tracing::debug!(folder = %folder, "skipping non-file workspace folder");
            continue;
        }
        let paths = resolver.resolve(folder).await;
        tracing::debug!(folder = %folder, found = paths.len(), "resolved cartridges");
        raw.extend(paths.into_iter().map(Cartridge::new));
    }

    let unique = remove_duplicates(raw, log);
    apply_allow_list(unique, config.allow_list(), log)
}
