//! Pure chain partitioning and retention classification.
//!
//! Chain boundaries are recomputed from the sorted name listing on every
//! run; nothing about membership is persisted. A chain owns every entry from
//! its full set up to, but excluding, the next full set: the half-open
//! interval `[fulls[i], fulls[i+1])` over the sorted listing. Entries that
//! are not backup sets at all still land in whichever interval their name
//! sorts into, so a stray directory inside an expired chain's interval is
//! removed with the chain.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::Serialize;

use crate::core::types::{is_full_set, set_date};

/// A full set and everything it anchors, in sort order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chain {
    /// Name of the full set heading the chain.
    pub full: String,
    /// Every member name, the full itself included.
    pub members: Vec<String>,
}

/// Split a listing into entries preceding any full set and the chains.
///
/// The leading entries (incrementals orphaned by a deleted head, foreign
/// names sorting before the first full) belong to no chain and are never
/// eligible for deletion. Input order is irrelevant; the listing is sorted
/// here.
pub fn partition_chains(names: &[String]) -> (Vec<String>, Vec<Chain>) {
    let mut sorted = names.to_vec();
    sorted.sort();

    let mut leading = Vec::new();
    let mut chains: Vec<Chain> = Vec::new();
    for name in sorted {
        if is_full_set(&name) {
            chains.push(Chain {
                full: name.clone(),
                members: vec![name],
            });
        } else if let Some(chain) = chains.last_mut() {
            chain.members.push(name);
        } else {
            leading.push(name);
        }
    }
    (leading, chains)
}

/// Classification of every superseded chain in a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrunePlan {
    /// Chains that are expired and superseded, oldest first. Deleting all of
    /// their members is safe: a later full set exists.
    pub expired: Vec<Chain>,
    /// Heads of superseded chains still within the retention window.
    pub retained: Vec<String>,
    /// Heads whose embedded date would not parse; their chains are kept and
    /// reported, never treated as expired.
    pub skipped: Vec<String>,
}

/// Decide which chains a pruning pass may delete.
///
/// Only chain heads carry an age: a chain expires when its full set's date
/// lies more than `retention_days` before `now`. The last chain is the
/// current chain and is never considered, so a listing with at most one full
/// set never prunes anything. Every superseded head is evaluated
/// independently; one unparseable head does not stop evaluation of the
/// others.
pub fn plan_prune(names: &[String], now: NaiveDateTime, retention_days: u32) -> PrunePlan {
    let (_, chains) = partition_chains(names);
    let mut plan = PrunePlan::default();
    if chains.len() <= 1 {
        return plan;
    }
    for chain in &chains[..chains.len() - 1] {
        let Some(head_date) = set_date(&chain.full) else {
            plan.skipped.push(chain.full.clone());
            continue;
        };
        if expired(head_date, now, retention_days) {
            plan.expired.push(chain.clone());
        } else {
            plan.retained.push(chain.full.clone());
        }
    }
    plan
}

/// Strictly-older-than comparison: a head dated exactly `retention_days` ago
/// is still inside the window.
fn expired(head_date: NaiveDate, now: NaiveDateTime, retention_days: u32) -> bool {
    now - head_date.and_time(NaiveTime::MIN) > TimeDelta::days(i64::from(retention_days))
}
