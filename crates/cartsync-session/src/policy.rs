//! Process-wide synchronization policy.
//!
//! One `SyncPolicy` is created per process and shared (`Arc`) by every
//! session manager, so a conflict decision made for one workspace applies to
//! all later sessions. Tests create their own instance.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use cartsync_core::{CartridgeResolution, ConflictPolicy};

#[derive(Debug, Default)]
pub struct SyncPolicy {
    conflict: Mutex<ConflictPolicy>,
    clean_requested: AtomicBool,
    first_start_done: AtomicBool,
}

impl SyncPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conflict_policy(&self) -> ConflictPolicy {
        match self.conflict.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Set the sticky resolution if none is set yet. Returns the resolution
    /// in effect afterwards, which is the earlier one if another session got
    /// there first.
    pub fn resolve_once(&self, resolution: CartridgeResolution) -> CartridgeResolution {
        let mut guard = match self.conflict.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match *guard {
            ConflictPolicy::Resolved(existing) => existing,
            ConflictPolicy::Unset => {
                *guard = ConflictPolicy::Resolved(resolution);
                tracing::info!(resolution = %resolution, "cartridge conflict policy is now sticky");
                resolution
            }
        }
    }

    /// Record an explicit clean request. Every later start cleans.
    pub fn request_clean(&self) {
        self.clean_requested.store(true, Ordering::Release);
    }

    pub fn clean_requested(&self) -> bool {
        self.clean_requested.load(Ordering::Acquire)
    }

    /// Effective clean-on-start flag for a session about to start.
    ///
    /// The `clean_on_start` setting only counts until a session of this
    /// process has reached running state; after an explicit clean request
    /// every start cleans.
    pub fn clean_on_start(&self, setting: bool) -> bool {
        self.clean_requested() || (setting && !self.first_start_done.load(Ordering::Acquire))
    }

    /// Record that a session came up. Attempts that were superseded or
    /// failed before this point leave the configured clean pending.
    pub fn mark_started(&self) {
        self.first_start_done.store(true, Ordering::Release);
    }
}
