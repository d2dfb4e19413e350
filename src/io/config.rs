//! Runtime configuration resolved from the environment.
//!
//! Everything is read once into a [`Config`] value that the planner, the
//! executor and the pruner receive explicitly; no component reads the
//! process environment on its own. Resolution goes through an injected
//! lookup function so unit tests never mutate process-wide state.

use std::env;
use std::fmt;
use std::path::PathBuf;

use anyhow::Result;

const BACKUP_DIR_VAR: &str = "BACKUP_DIR";
const RETENTION_DAYS_VAR: &str = "RETENTION_DAYS";
const FULL_BACKUP_DAY_VAR: &str = "FULL_BACKUP_DAY";
const BACKUP_TIMEOUT_VAR: &str = "BACKUP_TIMEOUT_SECS";
const PG_USER_VAR: &str = "PGUSER";
const PG_HOST_VAR: &str = "PGHOST";

const DEFAULT_BACKUP_ROOT: &str = "/backups";
const DEFAULT_RETENTION_DAYS: u32 = 7;
const DEFAULT_FULL_BACKUP_DAY: u32 = 1;

/// Settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding one subdirectory per backup set.
    pub backup_root: PathBuf,

    /// Chains whose full set is strictly older than this many days are
    /// expired (superseded chains only; the current chain has no age limit).
    pub retention_days: u32,

    /// Day of month on which the run takes a full backup regardless of what
    /// already exists.
    pub full_backup_day: u32,

    /// Kill the backup command after this many seconds. Unset means the run
    /// blocks until the command finishes.
    pub backup_timeout_secs: Option<u32>,

    /// Database user handed to the backup command.
    pub pg_user: String,

    /// Database host handed to the backup command.
    pub pg_host: String,
}

/// Missing or malformed configuration.
///
/// Carried inside `anyhow::Error`; `main` recovers it with `downcast_ref`
/// to exit with the configuration-error status.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ConfigError {}

fn config_err(message: impl Into<String>) -> anyhow::Error {
    anyhow::Error::new(ConfigError {
        message: message.into(),
    })
}

impl Config {
    /// Resolve configuration from the process environment.
    ///
    /// `BACKUP_DIR`, `RETENTION_DAYS` and `FULL_BACKUP_DAY` fall back to
    /// `/backups`, `7` and `1`; `BACKUP_TIMEOUT_SECS` is off unless set;
    /// `PGUSER` and `PGHOST` must be set and non-empty.
    pub fn from_env() -> Result<Config> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backup_root = get(BACKUP_DIR_VAR)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BACKUP_ROOT.to_string());
        let config = Config {
            backup_root: PathBuf::from(backup_root),
            retention_days: numeric_var(&get, RETENTION_DAYS_VAR, DEFAULT_RETENTION_DAYS)?,
            full_backup_day: numeric_var(&get, FULL_BACKUP_DAY_VAR, DEFAULT_FULL_BACKUP_DAY)?,
            backup_timeout_secs: optional_numeric_var(&get, BACKUP_TIMEOUT_VAR)?,
            pg_user: required_var(&get, PG_USER_VAR)?,
            pg_host: required_var(&get, PG_HOST_VAR)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=31).contains(&self.full_backup_day) {
            return Err(config_err(format!(
                "{FULL_BACKUP_DAY_VAR} must be a day of month (1-31), got {}",
                self.full_backup_day
            )));
        }
        if self.backup_timeout_secs == Some(0) {
            return Err(config_err(format!(
                "{BACKUP_TIMEOUT_VAR} must be positive when set"
            )));
        }
        Ok(())
    }
}

fn required_var<F>(get: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(config_err(format!("{key} must be set and non-empty"))),
    }
}

fn numeric_var<F>(get: &F, key: &str, default: u32) -> Result<u32>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
            config_err(format!("{key} must be a non-negative integer, got {raw:?}"))
        }),
    }
}

/// Like [`numeric_var`], but absent or empty means "off" rather than a
/// default value.
fn optional_numeric_var<F>(get: &F, key: &str) -> Result<Option<u32>>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse::<u32>().map(Some).map_err(|_| {
            config_err(format!("{key} must be a non-negative integer, got {raw:?}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // `use<>`: the closure owns its map, so the returned type must not
    // capture the `pairs` borrow; callers pass temporary slices.
    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_credentials_are_set() {
        let get = lookup(&[("PGUSER", "postgres"), ("PGHOST", "db.internal")]);
        let config = Config::from_lookup(get).expect("config");
        assert_eq!(config.backup_root, PathBuf::from("/backups"));
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.full_backup_day, 1);
        assert_eq!(config.backup_timeout_secs, None);
        assert_eq!(config.pg_user, "postgres");
        assert_eq!(config.pg_host, "db.internal");
    }

    #[test]
    fn every_variable_is_honored() {
        let get = lookup(&[
            ("BACKUP_DIR", "/srv/backups"),
            ("RETENTION_DAYS", "30"),
            ("FULL_BACKUP_DAY", "15"),
            ("BACKUP_TIMEOUT_SECS", "3600"),
            ("PGUSER", "backup"),
            ("PGHOST", "10.0.0.2"),
        ]);
        let config = Config::from_lookup(get).expect("config");
        assert_eq!(config.backup_root, PathBuf::from("/srv/backups"));
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.full_backup_day, 15);
        assert_eq!(config.backup_timeout_secs, Some(3600));
    }

    #[test]
    fn missing_credentials_are_a_config_error() {
        let get = lookup(&[("PGHOST", "db.internal")]);
        let err = Config::from_lookup(get).expect_err("missing PGUSER");
        let config_err = err.downcast_ref::<ConfigError>().expect("category");
        assert!(config_err.message.contains("PGUSER"));
    }

    #[test]
    fn empty_credentials_count_as_missing() {
        let get = lookup(&[("PGUSER", "postgres"), ("PGHOST", "")]);
        let err = Config::from_lookup(get).expect_err("empty PGHOST");
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn non_numeric_retention_is_rejected() {
        let get = lookup(&[
            ("PGUSER", "postgres"),
            ("PGHOST", "db"),
            ("RETENTION_DAYS", "soon"),
        ]);
        let err = Config::from_lookup(get).expect_err("bad retention");
        assert!(err.to_string().contains("RETENTION_DAYS"));
    }

    #[test]
    fn negative_retention_is_rejected() {
        let get = lookup(&[
            ("PGUSER", "postgres"),
            ("PGHOST", "db"),
            ("RETENTION_DAYS", "-1"),
        ]);
        let err = Config::from_lookup(get).expect_err("negative retention");
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn full_backup_day_must_be_a_real_day_of_month() {
        for bad in ["0", "32"] {
            let get = lookup(&[
                ("PGUSER", "postgres"),
                ("PGHOST", "db"),
                ("FULL_BACKUP_DAY", bad),
            ]);
            let err = Config::from_lookup(get).expect_err("out-of-range day");
            assert!(err.to_string().contains("FULL_BACKUP_DAY"));
        }
    }

    #[test]
    fn backup_timeout_rejects_zero_and_garbage() {
        for bad in ["0", "never"] {
            let get = lookup(&[
                ("PGUSER", "postgres"),
                ("PGHOST", "db"),
                ("BACKUP_TIMEOUT_SECS", bad),
            ]);
            let err = Config::from_lookup(get).expect_err("bad timeout");
            assert!(err.downcast_ref::<ConfigError>().is_some());
            assert!(err.to_string().contains("BACKUP_TIMEOUT_SECS"));
        }
    }
}
