use std::collections::HashSet;

use cartsync_core::Cartridge;

use crate::log::LogSurface;

/// Split `cartridges` into (kept, dropped) by basename.
///
/// The first cartridge with a given name is kept; every later one with the
/// same name is dropped. Both halves preserve input order.
pub fn partition_duplicates(cartridges: Vec<Cartridge>) -> (Vec<Cartridge>, Vec<Cartridge>) {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(cartridges.len());
    let mut dropped = Vec::new();

    for cartridge in cartridges {
        if seen.insert(cartridge.name().to_string()) {
            kept.push(cartridge);
        } else {
            dropped.push(cartridge);
        }
    }

    (kept, dropped)
}

/// Drop cartridges whose basename was already seen, warning once about all of
/// them. Advisory only: the caller always continues with the kept set.
pub fn remove_duplicates(cartridges: Vec<Cartridge>, log: &dyn LogSurface) -> Vec<Cartridge> {
    let (kept, dropped) = partition_duplicates(cartridges);
    if !dropped.is_empty() {
        let paths: Vec<String> = dropped
            .iter()
            .map(|c| c.path().display().to_string())
            .collect();
        log.warn(&format!(
            "Duplicate cartridge names found, ignoring: {}",
            paths.join(", ")
        ));
    }
    kept
}
