//! Resolve the next backup against the live backup root.

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::info;

use crate::core::planner::{NextBackup, plan_next_backup};
use crate::core::types::{BackupKind, set_name};
use crate::io::config::Config;
use crate::io::store;

/// Fully resolved description of the backup the run will take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupTarget {
    /// Directory name of the new set.
    pub name: String,
    /// Absolute destination under the backup root.
    pub dest: PathBuf,
    pub kind: BackupKind,
    /// Manifest the incremental builds on; `None` for full backups.
    pub anchor_manifest: Option<PathBuf>,
}

/// A planned incremental has no anchor manifest to build on.
///
/// The plan fails instead of falling back to a full backup, so a full only
/// ever happens when the operator's schedule (or an empty root) asks for
/// one. Carried inside `anyhow::Error` and recovered by `main` for its
/// distinct exit code.
#[derive(Debug)]
pub struct MissingManifestError {
    pub manifest: PathBuf,
}

impl fmt::Display for MissingManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "missing anchor manifest {}: cannot take an incremental backup",
            self.manifest.display()
        )
    }
}

impl std::error::Error for MissingManifestError {}

/// Decide the next backup and resolve it to concrete paths.
///
/// An absent backup root plans like an empty one (the run pipeline creates
/// the directory before the backup command needs it). For an incremental,
/// the anchor set's manifest must already exist; its absence fails the plan
/// before any backup command runs.
pub fn plan_backup(config: &Config, now: NaiveDateTime) -> Result<BackupTarget> {
    let existing = store::list_backup_sets(&config.backup_root)?.unwrap_or_default();
    let decision = plan_next_backup(&existing, now.date(), config.full_backup_day);
    let (kind, anchor_manifest) = match decision {
        NextBackup::Full => {
            if existing.is_empty() {
                info!("no existing backup sets, starting the first chain");
            } else {
                info!(
                    day = config.full_backup_day,
                    "full backup day, starting a new chain"
                );
            }
            (BackupKind::Full, None)
        }
        NextBackup::Incremental { anchor } => {
            let manifest = store::manifest_path(&config.backup_root, &anchor);
            if !manifest.exists() {
                return Err(anyhow::Error::new(MissingManifestError { manifest }));
            }
            info!(anchor = %anchor, "extending the current chain");
            (BackupKind::Incremental, Some(manifest))
        }
    };
    let name = set_name(now, kind);
    let dest = config.backup_root.join(&name);
    Ok(BackupTarget {
        name,
        dest,
        kind,
        anchor_manifest,
    })
}
