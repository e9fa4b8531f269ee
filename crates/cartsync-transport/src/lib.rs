//! Reference upload transport: mirrors the resolved cartridge set into a
//! sandbox directory on the local filesystem.

pub mod directory;
pub mod mirror;

pub use directory::{DirectorySession, DirectoryTransport};
pub use mirror::MirrorStats;
