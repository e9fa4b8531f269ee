//! Blocking filesystem primitives for mirroring cartridges into a sandbox
//! directory. Callers run these on the blocking pool.

use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use cartsync_core::SyncError;
use ignore::WalkBuilder;
use regex::Regex;
use sha2::{Digest, Sha256};

const BUFFER_SIZE: usize = 8 * 1024;

/// Outcome of mirroring one cartridge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MirrorStats {
    pub copied: usize,
    pub unchanged: usize,
}

impl MirrorStats {
    fn add(&mut self, other: MirrorStats) {
        self.copied += other.copied;
        self.unchanged += other.unchanged;
    }
}

/// SHA-256 digest of a file's content, read in fixed-size chunks.
pub fn content_digest(path: &Path) -> Result<[u8; 32]> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open {} for comparison", path.display()))?;
    let mut hasher = Sha256::new();
    let mut chunk = [0_u8; BUFFER_SIZE];
    loop {
        let n = file
            .read(&mut chunk)
            .with_context(|| format!("Failed to read {} for comparison", path.display()))?;
        if n == 0 {
            let mut digest = [0_u8; 32];
            digest.copy_from_slice(&hasher.finalize());
            return Ok(digest);
        }
        hasher.update(&chunk[..n]);
    }
}

/// Whether the uploaded copy at `remote` already matches `local`. A size
/// mismatch settles it without hashing either side.
pub fn is_up_to_date(local: &Path, remote: &Path) -> Result<bool> {
    let remote_len = match std::fs::metadata(remote) {
        Ok(metadata) if metadata.is_file() => metadata.len(),
        Ok(_) => return Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to inspect {}", remote.display()));
        }
    };
    let local_len = std::fs::metadata(local)
        .with_context(|| format!("Failed to inspect {}", local.display()))?
        .len();
    if local_len != remote_len {
        return Ok(false);
    }
    Ok(content_digest(local)? == content_digest(remote)?)
}

/// Remote entries may only be plain names directly under the version dir.
pub fn check_remote_name(name: &str) -> Result<(), SyncError> {
    let mut components = Path::new(name).components();
    let plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !plain || name.contains(['/', '\\']) || name.contains("..") {
        return Err(SyncError::UnsafeRemoteName(name.to_string()));
    }
    Ok(())
}

/// Entry names directly under `version_dir`, sorted.
pub fn list_remote(version_dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(version_dir)
        .with_context(|| format!("Failed to list sandbox: {}", version_dir.display()))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("Failed to read sandbox entry in {}", version_dir.display()))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Delete one remote entry (directories recursively).
pub fn delete_remote(version_dir: &Path, name: &str) -> Result<()> {
    check_remote_name(name)?;
    let target = version_dir.join(name);
    let metadata = match std::fs::symlink_metadata(&target) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to inspect {}", target.display()));
        }
    };
    let removed = if metadata.is_dir() {
        std::fs::remove_dir_all(&target)
    } else {
        std::fs::remove_file(&target)
    };
    removed.with_context(|| format!("Failed to delete remote entry: {}", target.display()))
}

/// Relative path with `/` separators, used for ignore matching.
fn slash_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether `path` inside `cartridge` matches an ignore pattern. Patterns
/// are matched against `<name>/<relative path>`.
pub fn is_ignored(cartridge: &Path, path: &Path, ignore: &[Regex]) -> bool {
    let (Some(name), Ok(relative)) = (cartridge.file_name(), path.strip_prefix(cartridge)) else {
        return false;
    };
    let candidate = slash_path(&Path::new(name).join(relative));
    ignore.iter().any(|re| re.is_match(&candidate))
}

/// Copy `cartridge` into `version_dir/<name>`, skipping ignored paths and
/// files whose content already matches.
pub fn mirror_cartridge(cartridge: &Path, version_dir: &Path, ignore: &[Regex]) -> Result<MirrorStats> {
    let name = cartridge
        .file_name()
        .with_context(|| format!("Cartridge path has no name: {}", cartridge.display()))?;
    let target_root = version_dir.join(name);
    let prefix = PathBuf::from(name);

    let filter_root = cartridge.to_path_buf();
    let filter_ignore = ignore.to_vec();
    let mut builder = WalkBuilder::new(cartridge);
    builder.standard_filters(false);
    builder.sort_by_file_name(|a, b| a.cmp(b));
    builder.filter_entry(move |entry| !is_ignored(&filter_root, entry.path(), &filter_ignore));

    let mut stats = MirrorStats::default();
    for result in builder.build() {
        let entry = result
            .with_context(|| format!("Failed to walk cartridge: {}", cartridge.display()))?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(cartridge)
            .with_context(|| format!("Entry outside cartridge: {}", entry.path().display()))?;
        let target = target_root.join(relative);

        if is_up_to_date(entry.path(), &target)? {
            stats.unchanged += 1;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::copy(entry.path(), &target).with_context(|| {
            format!(
                "Failed to upload {} to {}",
                entry.path().display(),
                target.display()
            )
        })?;
        stats.copied += 1;
    }
    tracing::trace!(cartridge = %prefix.display(), copied = stats.copied, "cartridge mirrored");
    Ok(stats)
}

/// Mirror every cartridge that still exists locally.
pub fn mirror_all(cartridges: &[PathBuf], version_dir: &Path, ignore: &[Regex]) -> Result<MirrorStats> {
    let mut total = MirrorStats::default();
    for cartridge in cartridges {
        if !cartridge.is_dir() {
            tracing::warn!(cartridge = %cartridge.display(), "cartridge directory missing, skipping");
            continue;
        }
        total.add(mirror_cartridge(cartridge, version_dir, ignore)?);
    }
    Ok(total)
}
