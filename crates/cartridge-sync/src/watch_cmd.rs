use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cartsync_config::paths;
use cartsync_core::WorkspaceFolder;
use cartsync_session::{
    Collaborators, CommandBus, FileSettingsProvider, LogSurface, ManagerEvent, ProjectFileResolver,
    SessionManager, SettingsProvider, SyncPolicy, WorkspaceConfigLoader, forward_commands,
};
use cartsync_transport::DirectoryTransport;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::console::{Console, ConsolePrompt, spawn_stdin_reader};
use crate::output::OutputChannel;
use crate::config_watch::ConfigWatcher;

const EVENT_CHANNEL_CAPACITY: usize = 32;

pub(crate) async fn handle_watch(folders: Vec<WorkspaceFolder>, sandbox: PathBuf) -> Result<()> {
    let output = Arc::new(OutputChannel::open(&paths::log_dir()));
    if let Some(path) = output.log_path() {
        output.info(&format!("Output log: {}", path.display()));
    }
    let log: Arc<dyn LogSurface> = output.clone();

    let settings = Arc::new(FileSettingsProvider::new());
    let debounce = match settings.settings(&folders) {
        Ok(current) => Duration::from_millis(current.upload.debounce_ms),
        Err(e) => {
            log.warn(&format!("Invalid settings, using the default debounce: {e:#}"));
            Duration::from_millis(cartsync_config::UploadSettings::default().debounce_ms)
        }
    };

    let prompt = Arc::new(ConsolePrompt::new(log.clone()));
    let collab = Collaborators {
        resolver: Arc::new(ProjectFileResolver),
        config_loader: Arc::new(WorkspaceConfigLoader),
        settings,
        transport: Arc::new(DirectoryTransport::new(sandbox)),
        prompt: prompt.clone(),
        log: log.clone(),
    };
    let policy = Arc::new(SyncPolicy::new());

    let bus = CommandBus::new();
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let forwarder = forward_commands(&bus, events_tx.clone());
    let (folders_tx, folders_rx) = watch::channel(folders.clone());
    let config_watcher = match ConfigWatcher::new(folders_rx, paths::user_settings_path()) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            log.warn(&format!(
                "Cannot watch settings files, edits will need a restart: {e:#}"
            ));
            None
        }
    };

    let manager = SessionManager::new(folders, collab, policy).await;

    let cancel = CancellationToken::new();
    let watcher_task = config_watcher
        .map(|watcher| tokio::spawn(watcher.run(debounce, events_tx.clone(), cancel.clone())));

    let console = Console {
        prompt,
        bus,
        folders: folders_tx,
        events: events_tx.clone(),
        log: log.clone(),
    };
    let console_task = tokio::spawn(console.run(spawn_stdin_reader()));

    let interrupt_tx = events_tx;
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupt received");
            let _ = interrupt_tx.send(ManagerEvent::Shutdown).await;
        }
    });

    manager.run(events_rx).await;

    cancel.cancel();
    if let Some(task) = watcher_task {
        if let Err(e) = task.await {
            tracing::debug!(error = %e, "config watcher ended abnormally");
        }
    }
    console_task.abort();
    interrupt.abort();
    forwarder.abort();
    log.info("Uploader stopped");
    Ok(())
}
