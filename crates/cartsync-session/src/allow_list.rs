//! Allow-list filtering of the deduplicated cartridge set.
//!
//! The result follows the allow-list's own order: cartridge override
//! priority on the sandbox depends on the configured sequence, not on the
//! order in which folders were scanned.

use cartsync_core::Cartridge;

use crate::log::LogSurface;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowListOutcome {
    pub selected: Vec<Cartridge>,
    /// Allow-list names with no resolved cartridge, in allow-list order.
    pub missing: Vec<String>,
}

/// Pure filtering step. `None` or an empty list keeps every cartridge in
/// discovery order.
pub fn filter_by_allow_list(
    cartridges: Vec<Cartridge>,
    allow_list: Option<&[String]>,
) -> AllowListOutcome {
    let Some(allow_list) = allow_list.filter(|names| !names.is_empty()) else {
        return AllowListOutcome {
            selected: cartridges,
            missing: Vec::new(),
        };
    };

    let mut selected = Vec::with_capacity(allow_list.len());
    let mut missing = Vec::new();
    for name in allow_list {
        if selected.iter().any(|c: &Cartridge| c.name() == name) {
            continue;
        }
        match cartridges.iter().find(|c| c.name() == name) {
            Some(cartridge) => selected.push(cartridge.clone()),
            None => {
                if !missing.contains(name) {
                    missing.push(name.clone());
                }
            }
        }
    }

    AllowListOutcome { selected, missing }
}

/// Filter and warn once about allow-list names that matched nothing. The
/// session still starts with whatever matched.
pub fn apply_allow_list(
    cartridges: Vec<Cartridge>,
    allow_list: Option<&[String]>,
    log: &dyn LogSurface,
) -> Vec<Cartridge> {
    let outcome = filter_by_allow_list(cartridges, allow_list);
    if !outcome.missing.is_empty() {
        log.warn(&format!(
            "Cartridges listed in config were not found in the workspace: {}. \
             Uploading the {} that matched.",
            outcome.missing.join(", "),
            outcome.selected.len()
        ));
    }
    outcome.selected
}
