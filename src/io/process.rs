//! Child process execution with bounded output capture.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Cap on captured bytes per stream. `pg_basebackup --progress` rewrites its
/// progress line for the whole transfer, so an unbounded capture grows with
/// transfer time.
pub const OUTPUT_LIMIT_BYTES: usize = 256 * 1024;

/// Output captured from a finished child.
#[derive(Debug)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes discarded past the per-stream cap.
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    /// The child outlived its timeout and was killed.
    pub timed_out: bool,
}

/// Run `cmd` to completion, draining stdout and stderr concurrently.
///
/// Each stream keeps at most [`OUTPUT_LIMIT_BYTES`]; bytes beyond that are
/// discarded while the pipe is still drained, so a chatty child can never
/// block on a full pipe. With `timeout` set, a child still running when it
/// expires is killed and the partial output is returned with `timed_out`
/// set; with `None` the call blocks until the child exits.
#[instrument(skip_all, fields(timeout_secs = timeout.map(|limit| limit.as_secs())))]
pub fn run_command(mut cmd: Command, timeout: Option<Duration>) -> Result<CapturedOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child");
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            error!(err = %err, "failed to spawn command");
            return Err(err).context("spawn command");
        }
    };

    let stdout_drain = drain(child.stdout.take(), "stdout")?;
    let stderr_drain = drain(child.stderr.take(), "stderr")?;

    let mut timed_out = false;
    let status = match timeout {
        Some(limit) => match child.wait_timeout(limit).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(timeout_secs = limit.as_secs(), "command timed out, killing");
                timed_out = true;
                child.kill().context("kill command")?;
                child.wait().context("wait command after kill")?
            }
        },
        None => child.wait().context("wait for command")?,
    };

    let (stdout, stdout_truncated) = stdout_drain.finish()?;
    let (stderr, stderr_truncated) = stderr_drain.finish()?;
    if stdout_truncated + stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output capture capped");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CapturedOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

/// Reader thread for one output pipe.
struct Drain {
    stream: &'static str,
    handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>,
}

fn drain<R>(pipe: Option<R>, stream: &'static str) -> Result<Drain>
where
    R: Read + Send + 'static,
{
    let pipe = pipe.with_context(|| format!("{stream} was not piped"))?;
    let handle = thread::spawn(move || read_capped(pipe, OUTPUT_LIMIT_BYTES));
    Ok(Drain { stream, handle })
}

impl Drain {
    /// Captured bytes plus the count of bytes discarded past the cap.
    fn finish(self) -> Result<(Vec<u8>, usize)> {
        match self.handle.join() {
            Ok(result) => result.with_context(|| format!("capture {}", self.stream)),
            Err(_) => Err(anyhow!("{} reader thread panicked", self.stream)),
        }
    }
}

/// Read `pipe` to EOF, keeping at most `cap` bytes and counting the rest.
fn read_capped<R: Read>(mut pipe: R, cap: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        let n = pipe.read(&mut chunk).context("read output")?;
        if n == 0 {
            return Ok((kept, dropped));
        }
        let keep = n.min(cap.saturating_sub(kept.len()));
        kept.extend_from_slice(&chunk[..keep]);
        dropped += n - keep;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_both_streams() {
        let output = run_command(sh("echo out; echo err >&2"), None).expect("run");
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "out\n");
        assert_eq!(String::from_utf8_lossy(&output.stderr), "err\n");
        assert!(!output.timed_out);
    }

    #[test]
    fn reports_nonzero_exit_status() {
        let output = run_command(sh("exit 3"), None).expect("run");
        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let cmd = Command::new("/nonexistent/definitely-not-a-binary");
        let err = run_command(cmd, None).expect_err("spawn");
        assert!(format!("{err:#}").contains("spawn command"));
    }

    #[test]
    fn kills_child_on_timeout() {
        let output =
            run_command(sh("sleep 30"), Some(Duration::from_millis(100))).expect("run");
        assert!(output.timed_out);
        assert!(!output.status.success());
    }

    #[test]
    fn output_beyond_the_limit_is_discarded() {
        let script = format!("head -c {} /dev/zero", OUTPUT_LIMIT_BYTES + 10_000);
        let output = run_command(sh(&script), None).expect("run");
        assert_eq!(output.stdout.len(), OUTPUT_LIMIT_BYTES);
        assert_eq!(output.stdout_truncated, 10_000);
    }
}
