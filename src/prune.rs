//! Delete expired, superseded chains from the backup root.

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, warn};

use crate::core::chains::plan_prune;
use crate::io::config::Config;
use crate::io::store;

/// What a prune pass deleted, kept, and could not handle.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct PruneOutcome {
    /// Members removed (or, on a dry run, slated for removal), chain order.
    pub deleted: Vec<String>,
    /// Members whose removal failed; the pass carried on past each one.
    pub failed: Vec<String>,
    /// Chain heads left alone because their date would not parse.
    pub skipped: Vec<String>,
    /// Superseded chain heads still within retention.
    pub retained: Vec<String>,
    /// True when the pass only reported; `deleted` then holds what a real
    /// pass would have removed.
    pub dry_run: bool,
}

/// Delete every expired, superseded chain under the configured root.
///
/// Deletion is best-effort: a member that fails to delete is recorded and
/// the pass moves on, so one stubborn directory cannot shield the rest of
/// an expired chain. Failed deletions make the outcome, not an `Err`; only
/// a failed root listing is an error.
pub fn prune_backups(config: &Config, now: NaiveDateTime, dry_run: bool) -> Result<PruneOutcome> {
    let Some(names) = store::list_backup_sets(&config.backup_root)? else {
        info!(root = %config.backup_root.display(), "backup root does not exist, nothing to prune");
        return Ok(PruneOutcome {
            dry_run,
            ..PruneOutcome::default()
        });
    };

    let plan = plan_prune(&names, now, config.retention_days);
    let mut outcome = PruneOutcome {
        skipped: plan.skipped,
        retained: plan.retained,
        dry_run,
        ..PruneOutcome::default()
    };
    for head in &outcome.skipped {
        warn!(set = %head, "no date in this chain head, leaving its chain alone");
    }
    for head in &outcome.retained {
        info!(set = %head, "superseded chain still within retention");
    }

    for chain in &plan.expired {
        info!(
            set = %chain.full,
            members = chain.members.len(),
            "chain expired, deleting"
        );
        for member in &chain.members {
            if dry_run {
                info!(set = %member, "would delete");
                outcome.deleted.push(member.clone());
                continue;
            }
            match store::delete_backup_set(&config.backup_root, member) {
                Ok(()) => {
                    info!(set = %member, "deleted");
                    outcome.deleted.push(member.clone());
                }
                Err(err) => {
                    warn!(set = %member, err = %format!("{err:#}"), "failed to delete, continuing");
                    outcome.failed.push(member.clone());
                }
            }
        }
    }

    if outcome.deleted.is_empty() && outcome.failed.is_empty() {
        info!("no chains past retention");
    }
    Ok(outcome)
}
