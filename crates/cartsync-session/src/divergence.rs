//! Reconciles the local cartridge set with the remote inventory.
//!
//! Decision order for remote entries that have no local counterpart:
//! 1. nothing extra: delete nothing
//! 2. sticky process policy already set: apply it
//! 3. `cartridgeResolution` in the config document: make it sticky, apply it
//! 4. ask the user; only the "Always" answers become sticky
//!
//! A sticky `remove` deletes the whole enumerated remote listing (local
//! cartridges are uploaded again afterwards), a one-shot "Remove All" only
//! deletes the extra entries. Archives are never deleted. A dismissed prompt
//! deletes nothing.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use cartsync_core::CartridgeResolution;
use tokio_util::sync::CancellationToken;

use crate::collab::{CleanupAdvisor, PromptChoice, UserPrompt};
use crate::log::LogSurface;
use crate::policy::SyncPolicy;

const ARCHIVE_SUFFIXES: &[&str] = &[".zip", ".jar", ".tar", ".tar.gz", ".tgz"];

/// Remote entries that look like packaged bundles rather than cartridges.
pub fn is_archive(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    ARCHIVE_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

pub struct DivergenceResolver {
    policy: Arc<SyncPolicy>,
    configured: Option<CartridgeResolution>,
    prompt: Arc<dyn UserPrompt>,
    log: Arc<dyn LogSurface>,
    cancel: CancellationToken,
}

impl DivergenceResolver {
    /// `cancel` is the owning session's token: once it fires, pending and
    /// future answers are discarded and nothing is deleted.
    pub fn new(
        policy: Arc<SyncPolicy>,
        configured: Option<CartridgeResolution>,
        prompt: Arc<dyn UserPrompt>,
        log: Arc<dyn LogSurface>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            policy,
            configured,
            prompt,
            log,
            cancel,
        }
    }

    /// Remote names to delete.
    pub async fn resolve(
        &self,
        remote: &BTreeSet<String>,
        local: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        if self.cancel.is_cancelled() {
            return BTreeSet::new();
        }

        let extra: BTreeSet<String> = remote
            .iter()
            .filter(|name| !local.contains(*name) && !is_archive(name))
            .cloned()
            .collect();
        if extra.is_empty() {
            return BTreeSet::new();
        }

        if let Some(resolution) = self.policy.conflict_policy().resolution() {
            tracing::debug!(resolution = %resolution, "applying sticky cartridge policy");
            return self.apply(resolution, remote);
        }

        if let Some(configured) = self.configured {
            let resolution = self.policy.resolve_once(configured);
            self.log.info(&format!(
                "Applying cartridgeResolution '{resolution}' from config"
            ));
            return self.apply(resolution, remote);
        }

        let names: Vec<&str> = extra.iter().map(String::as_str).collect();
        let message = format!(
            "The sandbox has cartridges that are not in the workspace: {}. Remove them?",
            names.join(", ")
        );
        self.log.warn(&message);

        let choice = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return BTreeSet::new(),
            choice = self.prompt.choose(&message, &PromptChoice::ALL) => choice,
        };
        if self.cancel.is_cancelled() {
            tracing::debug!("discarding conflict answer for a superseded session");
            return BTreeSet::new();
        }

        match choice {
            Some(PromptChoice::RemoveAllAlways) => {
                let resolution = self.policy.resolve_once(CartridgeResolution::Remove);
                self.apply(resolution, remote)
            }
            Some(PromptChoice::LeaveAllAlways) => {
                let resolution = self.policy.resolve_once(CartridgeResolution::Leave);
                self.apply(resolution, remote)
            }
            Some(PromptChoice::RemoveAll) => extra,
            Some(PromptChoice::LeaveAll) | None => BTreeSet::new(),
        }
    }

    fn apply(&self, resolution: CartridgeResolution, remote: &BTreeSet<String>) -> BTreeSet<String> {
        match resolution {
            CartridgeResolution::Remove => remote
                .iter()
                .filter(|name| !is_archive(name))
                .cloned()
                .collect(),
            CartridgeResolution::Leave => BTreeSet::new(),
        }
    }
}

#[async_trait]
impl CleanupAdvisor for DivergenceResolver {
    async fn ask_clean_cartridge(&self, remote: &[String], local: &[String]) -> Vec<String> {
        let remote: BTreeSet<String> = remote.iter().cloned().collect();
        let local: BTreeSet<String> = local.iter().cloned().collect();
        self.resolve(&remote, &local).await.into_iter().collect()
    }
}

#[cfg(test)]
#[path = "divergence_tests.rs"]
mod tests;
