use anyhow::Result;
use cartsync_core::WorkspaceFolder;
use cartsync_session::{
    ConfigLoader, LogLevel, MemoryLog, ProjectFileResolver, WorkspaceConfigLoader,
    resolve_cartridge_set,
};

/// Dry run of the resolution pipeline: prints the final cartridge set in
/// upload order (`name<TAB>path` on stdout) and the warnings on stderr.
pub(crate) async fn handle_cartridges(folders: Vec<WorkspaceFolder>) -> Result<()> {
    let config = WorkspaceConfigLoader.load(&folders).await?;
    let log = MemoryLog::new();
    let cartridges = resolve_cartridge_set(&folders, &ProjectFileResolver, &config, &log).await;

    eprintln!("Using config file '{}'", config.display_name());
    for (level, line) in log.lines() {
        match level {
            LogLevel::Info => eprintln!("{line}"),
            LogLevel::Warn | LogLevel::Error => eprintln!("[{}] {line}", level.as_str()),
        }
    }
    if cartridges.is_empty() {
        eprintln!("No cartridges found");
    }
    for cartridge in &cartridges {
        println!("{}\t{}", cartridge.name(), cartridge.path().display());
    }
    Ok(())
}
