//! Cartridge upload synchronization engine.
//!
//! Resolves the cartridge set for a workspace snapshot, reconciles it with
//! the remote inventory through a sticky conflict policy, and keeps exactly
//! one upload session alive per [`SessionManager`].

pub mod allow_list;
pub mod bus;
pub mod collab;
pub mod dedup;
pub mod divergence;
pub mod fswatch;
pub mod log;
pub mod manager;
pub mod pipeline;
pub mod policy;
pub mod resolver;
pub mod state;

pub use allow_list::{AllowListOutcome, apply_allow_list, filter_by_allow_list};
pub use bus::{CommandBus, forward_commands};
pub use collab::{
    CartridgeResolver, CleanupAdvisor, ConfigLoader, FileSettingsProvider, PromptChoice,
    SettingsProvider, Transport, UploadOptions, UploadSession, UserPrompt, WorkspaceConfigLoader,
};
pub use dedup::{partition_duplicates, remove_duplicates};
pub use divergence::{DivergenceResolver, is_archive};
pub use fswatch::{FsWatcher, existing_ancestor, is_content_change};
pub use log::{LogLevel, LogSurface, MemoryLog, TracingLog};
pub use manager::{Collaborators, SessionManager};
pub use pipeline::resolve_cartridge_set;
pub use policy::SyncPolicy;
pub use resolver::{ProjectFileResolver, discover_cartridges};
pub use state::{ManagerEvent, SessionState, SessionStatus};
