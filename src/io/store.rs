//! Filesystem access to the backup root.
//!
//! The root holds one subdirectory per backup set and nothing this crate
//! inspects beyond the directory names. Files at the top level are ignored
//! entirely: they are neither sets nor chain members.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Manifest artifact the backup tool writes into every set it produces.
/// An incremental run hands the anchor set's copy to the backup command.
pub const MANIFEST_FILE: &str = "backup_manifest";

/// Names of the immediate subdirectories of `root`, in directory order.
///
/// Returns `None` when the root itself does not exist: an uninitialized
/// root, not an error. Callers that need the root decide what that means
/// (the pruner treats it as an empty listing).
pub fn list_backup_sets(root: &Path) -> Result<Option<Vec<String>>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("list {}", root.display())),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry under {}", root.display()))?;
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {}", entry.path().display()))?;
        if file_type.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    debug!(root = %root.display(), sets = names.len(), "listed backup root");
    Ok(Some(names))
}

/// Create the backup root if it is missing.
pub fn ensure_backup_root(root: &Path) -> Result<()> {
    fs::create_dir_all(root).with_context(|| format!("create backup root {}", root.display()))
}

/// Recursively delete one backup set directory.
pub fn delete_backup_set(root: &Path, name: &str) -> Result<()> {
    let path = root.join(name);
    fs::remove_dir_all(&path).with_context(|| format!("delete {}", path.display()))
}

/// Path of the manifest artifact inside the named set.
pub fn manifest_path(root: &Path, set_name: &str) -> PathBuf {
    root.join(set_name).join(MANIFEST_FILE)
}
