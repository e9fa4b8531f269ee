//! Owner of the single upload session for one workspace snapshot.
//!
//! Events are consumed sequentially. Every start runs on its own task bound
//! to a fresh [`CancellationToken`]; a stop cancels that token and waits for
//! the task, so the previous session is torn down before the next `init`.
//! A start attempt that is still in flight when it gets superseded is
//! dropped at its next await point and its eventual result is discarded.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cartsync_core::{CommandEvent, SyncError, WorkspaceFolder};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

use crate::collab::{
    CartridgeResolver, ConfigLoader, SettingsProvider, Transport, UploadOptions, UploadSession,
    UserPrompt,
};
use crate::divergence::DivergenceResolver;
use crate::log::LogSurface;
use crate::pipeline::resolve_cartridge_set;
use crate::policy::SyncPolicy;
use crate::state::{ManagerEvent, SessionState, SessionStatus};

/// External collaborators shared by every session a manager starts.
#[derive(Clone)]
pub struct Collaborators {
    pub resolver: Arc<dyn CartridgeResolver>,
    pub config_loader: Arc<dyn ConfigLoader>,
    pub settings: Arc<dyn SettingsProvider>,
    pub transport: Arc<dyn Transport>,
    pub prompt: Arc<dyn UserPrompt>,
    /// Process-lifetime output surface. Sessions write to it but never close it.
    pub log: Arc<dyn LogSurface>,
}

struct ActiveSession {
    generation: u64,
    id: Ulid,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Everything one start attempt needs, moved onto its task.
struct Attempt {
    generation: u64,
    id: Ulid,
    folders: Vec<WorkspaceFolder>,
    collab: Collaborators,
    policy: Arc<SyncPolicy>,
    cancel: CancellationToken,
    status_tx: Arc<watch::Sender<SessionStatus>>,
}

pub struct SessionManager {
    folders: Vec<WorkspaceFolder>,
    collab: Collaborators,
    policy: Arc<SyncPolicy>,
    /// Last observed value of the `enabled` setting.
    enabled: bool,
    /// Whether a session should be running (cleared by disable).
    wanted: bool,
    generation: u64,
    active: Option<ActiveSession>,
    status_tx: Arc<watch::Sender<SessionStatus>>,
}

impl SessionManager {
    /// Read the enabled flag once and start right away when it is set.
    pub async fn new(
        folders: Vec<WorkspaceFolder>,
        collab: Collaborators,
        policy: Arc<SyncPolicy>,
    ) -> Self {
        let (status_tx, _status_rx) = watch::channel(SessionStatus::default());
        let mut manager = Self {
            folders,
            collab,
            policy,
            enabled: false,
            wanted: false,
            generation: 0,
            active: None,
            status_tx: Arc::new(status_tx),
        };

        manager.enabled = manager.read_enabled().unwrap_or(false);
        if manager.enabled {
            manager.wanted = true;
            manager.start_session().await;
        } else {
            manager.collab.log.info("Uploader is disabled");
        }
        manager
    }

    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    pub fn folders(&self) -> &[WorkspaceFolder] {
        &self.folders
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Consume events until [`ManagerEvent::Shutdown`] or until every sender
    /// is gone, then stop the session.
    pub async fn run(mut self, mut events: mpsc::Receiver<ManagerEvent>) {
        while let Some(event) = events.recv().await {
            if !self.handle(event).await {
                return;
            }
        }
        tracing::debug!("manager event channel closed");
        self.shutdown().await;
    }

    /// Apply one event. Returns false once the manager has shut down.
    pub async fn handle(&mut self, event: ManagerEvent) -> bool {
        tracing::debug!(event = ?event, generation = self.generation, "manager event");
        match event {
            ManagerEvent::Command(CommandEvent::EnableUpload) => self.enable().await,
            ManagerEvent::Command(CommandEvent::CleanUpload) => self.clean().await,
            ManagerEvent::Command(CommandEvent::DisableUpload) => self.disable().await,
            ManagerEvent::FoldersChanged(folders) => {
                self.folders = folders;
                if self.wanted {
                    self.start_session().await;
                }
            }
            ManagerEvent::SettingsChanged => self.on_settings_changed().await,
            ManagerEvent::ConfigChanged => {
                if self.wanted {
                    self.start_session().await;
                } else {
                    tracing::debug!("config changed while stopped, ignoring");
                }
            }
            ManagerEvent::Shutdown => {
                self.shutdown().await;
                return false;
            }
        }
        true
    }

    /// Force a full restart.
    pub async fn enable(&mut self) {
        self.wanted = true;
        self.start_session().await;
    }

    /// Make this and every later start clean the sandbox, then restart.
    pub async fn clean(&mut self) {
        self.policy.request_clean();
        self.wanted = true;
        self.start_session().await;
    }

    pub async fn disable(&mut self) {
        self.wanted = false;
        self.stop_session().await;
    }

    pub async fn shutdown(&mut self) {
        self.wanted = false;
        self.stop_session().await;
    }

    async fn on_settings_changed(&mut self) {
        let Some(enabled) = self.read_enabled() else {
            return;
        };
        if enabled == self.enabled {
            return;
        }
        self.enabled = enabled;
        if enabled {
            self.collab.log.info("Uploader enabled");
            self.enable().await;
        } else {
            self.collab.log.info("Uploader disabled");
            self.disable().await;
        }
    }

    fn read_enabled(&self) -> Option<bool> {
        match self.collab.settings.settings(&self.folders) {
            Ok(settings) => Some(settings.upload.enabled),
            Err(e) => {
                self.collab
                    .log
                    .error(&format!("Failed to read settings: {e:#}"));
                None
            }
        }
    }

    async fn start_session(&mut self) {
        let restart = self
            .active
            .as_ref()
            .is_some_and(|active| !active.task.is_finished());
        self.stop_session().await;

        self.generation += 1;
        let generation = self.generation;
        let id = Ulid::new();
        let cancel = CancellationToken::new();

        self.collab
            .log
            .info(if restart { "Restarting" } else { "Starting..." });
        tracing::info!(session = %id, generation, "starting upload session");
        self.status_tx.send_replace(SessionStatus {
            generation,
            state: SessionState::Starting,
            session_id: Some(id),
        });

        let attempt = Attempt {
            generation,
            id,
            folders: self.folders.clone(),
            collab: self.collab.clone(),
            policy: Arc::clone(&self.policy),
            cancel: cancel.clone(),
            status_tx: Arc::clone(&self.status_tx),
        };
        let task = tokio::spawn(run_session(attempt));
        self.active = Some(ActiveSession {
            generation,
            id,
            cancel,
            task,
        });
    }

    async fn stop_session(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        if !active.task.is_finished() {
            publish(
                &self.status_tx,
                active.generation,
                SessionState::Stopping,
                Some(active.id),
            );
        }
        active.cancel.cancel();
        if let Err(e) = active.task.await {
            tracing::error!(session = %active.id, error = %e, "upload session task failed");
        }
        publish(
            &self.status_tx,
            active.generation,
            SessionState::Stopped,
            None,
        );
        tracing::info!(
            session = %active.id,
            generation = active.generation,
            "upload session stopped"
        );
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}

/// Update the status only if `generation` is still the current one.
fn publish(
    status_tx: &watch::Sender<SessionStatus>,
    generation: u64,
    state: SessionState,
    session_id: Option<Ulid>,
) {
    status_tx.send_if_modified(|status| {
        let next = SessionStatus {
            generation,
            state,
            session_id,
        };
        if status.generation != generation || *status == next {
            return false;
        }
        *status = next;
        true
    });
}

async fn run_session(attempt: Attempt) {
    let log = Arc::clone(&attempt.collab.log);

    let started = tokio::select! {
        biased;
        _ = attempt.cancel.cancelled() => {
            tracing::debug!(session = %attempt.id, "start attempt superseded");
            return;
        }
        result = start_upload(&attempt) => result,
    };

    let mut session = match started {
        Ok(session) => session,
        Err(e) => {
            log.error(&format!("Failed to start upload session: {e:#}"));
            tracing::debug!(session = %attempt.id, error = ?e, "start failure detail");
            publish(
                &attempt.status_tx,
                attempt.generation,
                SessionState::Stopped,
                None,
            );
            return;
        }
    };
    if attempt.cancel.is_cancelled() {
        session.stop();
        return;
    }

    publish(
        &attempt.status_tx,
        attempt.generation,
        SessionState::Running,
        Some(attempt.id),
    );
    attempt.policy.mark_started();
    tracing::info!(session = %attempt.id, generation = attempt.generation, "upload session running");

    let cancelled = tokio::select! {
        biased;
        _ = attempt.cancel.cancelled() => true,
        result = session.closed() => {
            match result {
                Ok(()) => log.info("Upload session ended"),
                Err(e) => log.error(&format!("Upload session failed: {e:#}")),
            }
            false
        }
    };
    if cancelled {
        session.stop();
    } else {
        publish(
            &attempt.status_tx,
            attempt.generation,
            SessionState::Stopped,
            None,
        );
    }
}

async fn start_upload(attempt: &Attempt) -> Result<Box<dyn UploadSession>> {
    let collab = &attempt.collab;
    if !attempt.folders.iter().any(WorkspaceFolder::is_file) {
        return Err(SyncError::NoWorkspaceFolders.into());
    }

    let settings = collab.settings.settings(&attempt.folders)?;
    let mut config = collab.config_loader.load(&attempt.folders).await?;
    collab
        .log
        .info(&format!("Using config file '{}'", config.display_name()));

    let cartridges = resolve_cartridge_set(
        &attempt.folders,
        collab.resolver.as_ref(),
        &config,
        collab.log.as_ref(),
    )
    .await;
    if cartridges.is_empty() {
        collab
            .log
            .warn("No cartridges found in the workspace, nothing will be uploaded");
    }
    config.cartridge = Some(
        cartridges
            .iter()
            .map(|c| c.path().to_string_lossy().into_owned())
            .collect(),
    );

    let options = UploadOptions {
        clean_on_start: attempt
            .policy
            .clean_on_start(settings.upload.clean_on_start),
        ignore_list: settings.upload.ignore_list.clone(),
        debounce: Duration::from_millis(settings.upload.debounce_ms),
    };
    let advisor = Arc::new(DivergenceResolver::new(
        Arc::clone(&attempt.policy),
        config.cartridge_resolution,
        Arc::clone(&collab.prompt),
        Arc::clone(&collab.log),
        attempt.cancel.clone(),
    ));

    tracing::info!(
        session = %attempt.id,
        generation = attempt.generation,
        cartridges = cartridges.len(),
        clean_on_start = options.clean_on_start,
        "initializing upload transport"
    );
    collab
        .transport
        .init(config, Arc::clone(&collab.log), options, advisor)
        .await
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
