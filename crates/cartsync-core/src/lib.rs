//! Domain types shared by every cartsync crate.

pub mod error;
pub mod types;

pub use error::SyncError;
pub use types::{
    Cartridge, CartridgeResolution, CommandEvent, ConflictPolicy, FILE_SCHEME, WorkspaceFolder,
};
