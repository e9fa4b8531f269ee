use cartsync_core::{CommandEvent, WorkspaceFolder};
use ulid::Ulid;

/// Lifecycle of the single session owned by a manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

/// Published on the manager's watch channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStatus {
    /// Start attempt counter; 0 before the first start.
    pub generation: u64,
    pub state: SessionState,
    pub session_id: Option<Ulid>,
}

/// Events consumed, in order, by [`crate::SessionManager::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    Command(CommandEvent),
    /// The workspace folder snapshot changed.
    FoldersChanged(Vec<WorkspaceFolder>),
    /// Process settings changed; only a flip of the enabled flag matters.
    SettingsChanged,
    /// The upload config document changed.
    ConfigChanged,
    Shutdown,
}
