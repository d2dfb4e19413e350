//! Naming convention for backup sets.
//!
//! A backup set's directory name is `<timestamp><kind-suffix>`, e.g.
//! `2024-01-10T03-15-00_full`. The timestamp layout is fixed-width, so
//! lexicographic order over names equals chronological order; every chain
//! computation in this crate relies on that and never touches filesystem
//! metadata.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Timestamp layout for set names. Fixed-width so string order is time order.
pub const SET_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Date layout embedded in a set name, used for retention comparison.
pub const SET_DATE_FORMAT: &str = "%Y-%m-%d";

static SET_NAME_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}-\d{2}-\d{2}_(full|incremental)$").unwrap()
});

static SET_DATE_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// Role of a backup set within its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    /// Self-contained set; heads a chain.
    Full,
    /// Delta against the previous set in the chain.
    Incremental,
}

impl BackupKind {
    /// Name suffix identifying this kind.
    pub fn suffix(self) -> &'static str {
        match self {
            BackupKind::Full => "_full",
            BackupKind::Incremental => "_incremental",
        }
    }

    /// Classify a directory name by its kind suffix, if it has one.
    pub fn of_name(name: &str) -> Option<BackupKind> {
        if name.ends_with(BackupKind::Full.suffix()) {
            Some(BackupKind::Full)
        } else if name.ends_with(BackupKind::Incremental.suffix()) {
            Some(BackupKind::Incremental)
        } else {
            None
        }
    }
}

/// Compose the directory name for a set taken at `stamp`.
pub fn set_name(stamp: NaiveDateTime, kind: BackupKind) -> String {
    format!("{}{}", stamp.format(SET_TIMESTAMP_FORMAT), kind.suffix())
}

/// Whether `name` is a full set, i.e. a chain head.
pub fn is_full_set(name: &str) -> bool {
    name.ends_with(BackupKind::Full.suffix())
}

/// Calendar date embedded in a set name: the substring before the first `T`
/// (the whole name if there is none), parsed as `YYYY-MM-DD`.
///
/// The date part must be exactly four-two-two digits; the looser year forms
/// chrono would also take (a sign, fewer digits) do not parse. Returns
/// `None` for names that do not carry a date. Callers treat that as "age
/// unknown", never as expired.
pub fn set_date(name: &str) -> Option<NaiveDate> {
    let date_part = match name.split_once('T') {
        Some((prefix, _)) => prefix,
        None => name,
    };
    if !SET_DATE_RE.is_match(date_part) {
        return None;
    }
    NaiveDate::parse_from_str(date_part, SET_DATE_FORMAT).ok()
}

/// Strict check that `name` follows the set naming convention exactly.
///
/// Looser checks ([`is_full_set`], [`set_date`]) drive the pruning decisions
/// themselves; this one only flags foreign entries in listings.
pub fn is_set_name(name: &str) -> bool {
    SET_NAME_RE.is_match(name)
}
