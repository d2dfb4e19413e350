//! Backup command invocation.
//!
//! The [`BackupExecutor`] trait decouples the run pipeline from
//! `pg_basebackup` itself. Tests use fakes that record requests and
//! materialize destination directories without spawning anything.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info, instrument};

use crate::core::types::BackupKind;
use crate::io::config::Config;
use crate::io::process::run_command;

/// One backup for the executor to materialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRequest {
    /// Destination directory for the new set. Created by the backup command
    /// itself; it must not pre-exist.
    pub dest: PathBuf,
    pub kind: BackupKind,
    /// Manifest of the anchor set; present exactly for incremental requests.
    pub anchor_manifest: Option<PathBuf>,
}

/// Materializes one backup set at the requested destination.
///
/// On success the destination holds a complete set, manifest included. Any
/// failure is fatal for the run: the caller must not prune afterwards.
pub trait BackupExecutor {
    fn execute(&self, request: &BackupRequest) -> Result<()>;
}

/// The backup command failed: nonzero exit, timeout, or it never ran.
///
/// Carried inside `anyhow::Error`; `main` recovers it with `downcast_ref`
/// to exit with the backup-failure status.
#[derive(Debug)]
pub struct BackupCommandError {
    /// Exit code when the command ran and exited on its own.
    pub status: Option<i32>,
    pub timed_out: bool,
}

impl fmt::Display for BackupCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.timed_out {
            return write!(f, "backup command timed out");
        }
        match self.status {
            Some(code) => write!(f, "backup command exited with status {code}"),
            None => write!(f, "backup command did not run to completion"),
        }
    }
}

impl std::error::Error for BackupCommandError {}

/// Executor that spawns `pg_basebackup`.
pub struct PgBaseBackup {
    pg_user: String,
    pg_host: String,
    timeout: Option<Duration>,
}

impl PgBaseBackup {
    /// Executor configured from [`Config`]: credentials plus the optional
    /// `BACKUP_TIMEOUT_SECS` limit. Without the limit the run blocks until
    /// the backup finishes.
    pub fn new(config: &Config) -> PgBaseBackup {
        PgBaseBackup {
            pg_user: config.pg_user.clone(),
            pg_host: config.pg_host.clone(),
            timeout: config
                .backup_timeout_secs
                .map(|secs| Duration::from_secs(u64::from(secs))),
        }
    }

    fn command(&self, request: &BackupRequest) -> Command {
        let mut cmd = Command::new("pg_basebackup");
        cmd.arg("-D")
            .arg(&request.dest)
            .args(["-F", "t", "-X", "stream", "--checkpoint=fast"]);
        if let Some(manifest) = &request.anchor_manifest {
            let mut arg = OsString::from("--incremental=");
            arg.push(manifest);
            cmd.arg(arg);
        }
        cmd.arg(format!("--label={}", label(request.kind)))
            .arg("--progress");
        // Credentials travel over the libpq environment, the same channel
        // carrying the operator's other connection settings (port, password
        // file), which stay inherited.
        cmd.env("PGUSER", &self.pg_user).env("PGHOST", &self.pg_host);
        cmd
    }
}

fn label(kind: BackupKind) -> &'static str {
    match kind {
        BackupKind::Full => "full_backup",
        BackupKind::Incremental => "incremental_backup",
    }
}

impl BackupExecutor for PgBaseBackup {
    #[instrument(skip_all, fields(dest = %request.dest.display(), kind = ?request.kind))]
    fn execute(&self, request: &BackupRequest) -> Result<()> {
        info!("starting pg_basebackup");
        let output = run_command(self.command(request), self.timeout).context(
            BackupCommandError {
                status: None,
                timed_out: false,
            },
        )?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            debug!(stdout = %stdout.trim(), "pg_basebackup stdout");
        }

        if output.timed_out {
            error!(stderr = %stderr.trim(), "pg_basebackup timed out");
            return Err(anyhow::Error::new(BackupCommandError {
                status: None,
                timed_out: true,
            }));
        }
        if !output.status.success() {
            error!(
                exit_code = ?output.status.code(),
                stderr = %stderr.trim(),
                "pg_basebackup failed"
            );
            return Err(anyhow::Error::new(BackupCommandError {
                status: output.status.code(),
                timed_out: false,
            }));
        }

        if !stderr.trim().is_empty() {
            // Progress and completion notices arrive on stderr even on success.
            debug!(stderr = %stderr.trim(), "pg_basebackup stderr");
        }
        info!("pg_basebackup completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::path::Path;

    fn executor() -> PgBaseBackup {
        PgBaseBackup {
            pg_user: "postgres".to_string(),
            pg_host: "db.internal".to_string(),
            timeout: None,
        }
    }

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn full_backup_command_line() {
        let request = BackupRequest {
            dest: PathBuf::from("/backups/2024-01-01T00-00-00_full"),
            kind: BackupKind::Full,
            anchor_manifest: None,
        };
        let cmd = executor().command(&request);
        assert_eq!(cmd.get_program(), OsStr::new("pg_basebackup"));
        assert_eq!(
            args_of(&cmd),
            vec![
                "-D",
                "/backups/2024-01-01T00-00-00_full",
                "-F",
                "t",
                "-X",
                "stream",
                "--checkpoint=fast",
                "--label=full_backup",
                "--progress",
            ]
        );
    }

    #[test]
    fn incremental_backup_command_line() {
        let request = BackupRequest {
            dest: PathBuf::from("/backups/2024-01-02T00-00-00_incremental"),
            kind: BackupKind::Incremental,
            anchor_manifest: Some(PathBuf::from(
                "/backups/2024-01-01T00-00-00_full/backup_manifest",
            )),
        };
        let cmd = executor().command(&request);
        assert_eq!(
            args_of(&cmd),
            vec![
                "-D",
                "/backups/2024-01-02T00-00-00_incremental",
                "-F",
                "t",
                "-X",
                "stream",
                "--checkpoint=fast",
                "--incremental=/backups/2024-01-01T00-00-00_full/backup_manifest",
                "--label=incremental_backup",
                "--progress",
            ]
        );
    }

    #[test]
    fn credentials_reach_the_child_environment() {
        let request = BackupRequest {
            dest: PathBuf::from("/backups/2024-01-01T00-00-00_full"),
            kind: BackupKind::Full,
            anchor_manifest: None,
        };
        let cmd = executor().command(&request);
        let envs: Vec<(&OsStr, Option<&OsStr>)> = cmd.get_envs().collect();
        assert!(envs.contains(&(OsStr::new("PGUSER"), Some(OsStr::new("postgres")))));
        assert!(envs.contains(&(OsStr::new("PGHOST"), Some(OsStr::new("db.internal")))));
    }

    #[test]
    fn command_error_messages_name_the_failure() {
        let exited = BackupCommandError {
            status: Some(2),
            timed_out: false,
        };
        assert_eq!(exited.to_string(), "backup command exited with status 2");

        let timed_out = BackupCommandError {
            status: None,
            timed_out: true,
        };
        assert_eq!(timed_out.to_string(), "backup command timed out");

        let never_ran = BackupCommandError {
            status: None,
            timed_out: false,
        };
        assert_eq!(
            never_ran.to_string(),
            "backup command did not run to completion"
        );
    }

    #[test]
    fn new_copies_settings_from_config() {
        let mut config = Config {
            backup_root: Path::new("/backups").to_path_buf(),
            retention_days: 7,
            full_backup_day: 1,
            backup_timeout_secs: None,
            pg_user: "backup".to_string(),
            pg_host: "10.0.0.2".to_string(),
        };
        let executor = PgBaseBackup::new(&config);
        assert_eq!(executor.pg_user, "backup");
        assert_eq!(executor.pg_host, "10.0.0.2");
        assert!(executor.timeout.is_none());

        config.backup_timeout_secs = Some(600);
        let executor = PgBaseBackup::new(&config);
        assert_eq!(executor.timeout, Some(Duration::from_secs(600)));
    }
}
