//! One-shot child processes with a wall-clock limit and capped output.

use std::io::Read;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Bytes kept from one stream, plus how many were dropped past the cap.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Captured {
    pub bytes: Vec<u8>,
    pub dropped: usize,
}

impl Captured {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Result of a finished (or killed) child.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Captured,
    pub stderr: Captured,
    pub timed_out: bool,
}

impl ProcessOutput {
    /// Stdout followed by stderr, then one `[label stream truncated N bytes]`
    /// line per capped stream.
    pub fn combined_text(&self, label: &str) -> String {
        let mut text = self.stdout.text();
        text.push_str(&self.stderr.text());
        for (stream, captured) in [("stdout", &self.stdout), ("stderr", &self.stderr)] {
            if captured.dropped > 0 {
                text.push_str(&format!(
                    "\n[{label} {stream} truncated {} bytes]",
                    captured.dropped
                ));
            }
        }
        text
    }
}

/// Spawn `cmd`, wait at most `timeout`, and keep up to `limit` bytes per stream.
///
/// Both pipes are drained on their own threads for the whole run so a chatty
/// child never blocks on a full pipe. A child still running at the deadline
/// is killed and reported with `timed_out`.
#[instrument(skip_all, fields(timeout_ms = timeout.as_millis() as u64, limit))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    limit: usize,
) -> Result<ProcessOutput> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("spawn command")?;
    debug!(pid = child.id(), "child spawned");

    let (stdout_reader, stderr_reader) = spawn_capture(&mut child, limit)?;

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => (status, false),
        None => {
            warn!("deadline passed, killing child");
            child.kill().context("kill command")?;
            (child.wait().context("reap killed command")?, true)
        }
    };

    let stdout = finish_capture(stdout_reader).context("collect stdout")?;
    let stderr = finish_capture(stderr_reader).context("collect stderr")?;
    debug!(
        exit_code = ?status.code(),
        timed_out,
        stdout_dropped = stdout.dropped,
        stderr_dropped = stderr.dropped,
        "child finished"
    );

    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

type CaptureHandle = JoinHandle<Result<Captured>>;

fn spawn_capture(child: &mut Child, limit: usize) -> Result<(CaptureHandle, CaptureHandle)> {
    let stdout: ChildStdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr: ChildStderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    Ok((
        thread::spawn(move || capture(stdout, limit)),
        thread::spawn(move || capture(stderr, limit)),
    ))
}

fn finish_capture(handle: CaptureHandle) -> Result<Captured> {
    handle
        .join()
        .map_err(|_| anyhow!("capture thread panicked"))?
}

fn capture(mut reader: impl Read, limit: usize) -> Result<Captured> {
    let mut out = Captured::default();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read child output")?;
        if n == 0 {
            return Ok(out);
        }
        let keep = n.min(limit.saturating_sub(out.bytes.len()));
        out.bytes.extend_from_slice(&chunk[..keep]);
        out.dropped += n - keep;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn keeps_streams_separate() {
        let output = run_command_with_timeout(sh("echo out; echo err >&2"), Duration::from_secs(5), 1024)
            .expect("run");
        assert!(output.status.success());
        assert_eq!(output.stdout.text(), "out\n");
        assert_eq!(output.stderr.text(), "err\n");
        assert_eq!(output.combined_text("go"), "out\nerr\n");
        assert!(!output.timed_out);
    }

    #[test]
    fn caps_each_stream_and_counts_the_rest() {
        let output =
            run_command_with_timeout(sh("printf 0123456789"), Duration::from_secs(5), 4).expect("run");
        assert_eq!(output.stdout.bytes, b"0123");
        assert_eq!(output.stdout.dropped, 6);
        assert_eq!(
            output.combined_text("go"),
            "0123\n[go stdout truncated 6 bytes]"
        );
    }

    #[test]
    fn kills_a_child_past_the_deadline() {
        let output =
            run_command_with_timeout(sh("exec sleep 5"), Duration::from_millis(200), 1024).expect("run");
        assert!(output.timed_out);
        assert!(!output.status.success());
    }

    #[test]
    fn missing_binary_is_an_error() {
        let err = run_command_with_timeout(
            Command::new("/nonexistent/binary"),
            Duration::from_secs(1),
            16,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("spawn command"));
    }
}
