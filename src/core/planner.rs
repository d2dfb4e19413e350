//! Pure decision: full or incremental next.

use chrono::{Datelike, NaiveDate};

/// Kind of backup the next run should take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextBackup {
    /// Start a new chain.
    Full,
    /// Extend the current chain, building on the latest existing set.
    Incremental {
        /// Name of the set the incremental is anchored at. May itself be an
        /// incremental: the backup tool supports chained incrementals, so the
        /// anchor is always the newest set regardless of kind.
        anchor: String,
    },
}

/// Decide the next backup from the existing listing.
///
/// Priority order: an empty root bootstraps with a full backup; the
/// configured day of month forces a full backup; otherwise the run is
/// incremental on the lexicographically greatest existing name (which is the
/// chronologically newest set under the naming convention).
pub fn plan_next_backup(existing: &[String], today: NaiveDate, full_backup_day: u32) -> NextBackup {
    let Some(latest) = existing.iter().max() else {
        return NextBackup::Full;
    };
    if today.day() == full_backup_day {
        return NextBackup::Full;
    }
    NextBackup::Incremental {
        anchor: latest.clone(),
    }
}
