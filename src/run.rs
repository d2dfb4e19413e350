//! The cron entry point pipeline: back up, then prune.

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::info;

use crate::io::config::Config;
use crate::io::executor::{BackupExecutor, BackupRequest};
use crate::io::store;
use crate::plan::{BackupTarget, plan_backup};
use crate::prune::{PruneOutcome, prune_backups};

/// Everything a completed run did.
#[derive(Debug, Serialize)]
pub struct RunOutcome {
    pub backup: BackupTarget,
    pub prune: PruneOutcome,
}

/// Take the next backup, then prune expired chains.
///
/// The order is fixed: create the root if missing, resolve the plan, run
/// the backup command, and only then prune. A failed backup aborts before
/// pruning and leaves every existing set in place.
pub fn run_backup(
    config: &Config,
    executor: &dyn BackupExecutor,
    now: NaiveDateTime,
) -> Result<RunOutcome> {
    store::ensure_backup_root(&config.backup_root)?;
    let target = plan_backup(config, now)?;
    info!(set = %target.name, kind = ?target.kind, "taking backup");

    let request = BackupRequest {
        dest: target.dest.clone(),
        kind: target.kind,
        anchor_manifest: target.anchor_manifest.clone(),
    };
    executor.execute(&request)?;

    let prune = prune_backups(config, now, false)?;
    Ok(RunOutcome {
        backup: target,
        prune,
    })
}
