//! Test-only fixtures: a disposable backup root and a scripted executor.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};

use crate::io::config::Config;
use crate::io::executor::{BackupExecutor, BackupRequest};
use crate::io::store::MANIFEST_FILE;

/// Disposable backup root backed by a tempdir, removed on drop.
pub struct TestRoot {
    dir: tempfile::TempDir,
}

impl TestRoot {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A config pointing at this root, with small fixed settings.
    pub fn config(&self) -> Config {
        Config {
            backup_root: self.dir.path().to_path_buf(),
            retention_days: 7,
            full_backup_day: 1,
            backup_timeout_secs: None,
            pg_user: "postgres".to_string(),
            pg_host: "localhost".to_string(),
        }
    }

    /// Create an empty set directory under the root.
    pub fn add_set(&self, name: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::create_dir(&path).with_context(|| format!("create set {name}"))?;
        Ok(path)
    }

    /// Create a set directory that carries a `backup_manifest`.
    pub fn add_set_with_manifest(&self, name: &str) -> Result<PathBuf> {
        let path = self.add_set(name)?;
        fs::write(path.join(MANIFEST_FILE), b"{}")
            .with_context(|| format!("write manifest for {name}"))?;
        Ok(path)
    }

    /// Sorted names of every entry currently under the root.
    pub fn set_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.dir.path()).context("read root")? {
            let entry = entry.context("read root entry")?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

/// Stand-in for the real backup command.
///
/// A successful call materializes the destination directory with a manifest
/// inside, which is exactly what a later incremental needs to anchor on. A
/// scripted failure returns the given message without touching the
/// filesystem.
#[derive(Default)]
pub struct FakeBackupExecutor {
    requests: Mutex<Vec<BackupRequest>>,
    fail_with: Option<String>,
}

impl FakeBackupExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// An executor whose every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    /// Requests seen so far, in call order.
    pub fn requests(&self) -> Vec<BackupRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl BackupExecutor for FakeBackupExecutor {
    fn execute(&self, request: &BackupRequest) -> Result<()> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        if let Some(message) = &self.fail_with {
            return Err(anyhow!("{message}"));
        }
        fs::create_dir_all(&request.dest).context("materialize set")?;
        fs::write(request.dest.join(MANIFEST_FILE), b"{}").context("materialize manifest")?;
        Ok(())
    }
}
