//! Persistent shell session used by the `bash` tool.
//!
//! One shell process stays alive across commands so working directory and
//! exported variables carry over. Reader threads drain stdout and stderr into
//! channels as soon as bytes arrive. Each command runs with stdin closed and is
//! followed by an `echo` of a fresh sentinel on both streams; a command is
//! complete once both sentinels have been read.
//!
//! Sentinels of commands that timed out stay queued per stream. The next
//! command first reads past them, so late output never reaches its result.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::core::error::SessionError;
use crate::io::config::BashConfig;

/// Observable lifecycle of a [`BashSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    NotStarted,
    Running,
    Stopped,
}

/// Captured output of one command, sentinel stripped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BashOutput {
    pub stdout: String,
    pub stderr: String,
}

impl BashOutput {
    /// Stdout, or stderr when stdout is empty.
    pub fn into_result_text(self) -> String {
        if self.stdout.is_empty() && !self.stderr.is_empty() {
            self.stderr
        } else {
            self.stdout
        }
    }
}

enum SessionState {
    NotStarted,
    Running(Shell),
    Stopped,
}

struct Shell {
    child: Child,
    stdin: ChildStdin,
    stdout: Stream,
    stderr: Stream,
}

/// One output stream and the framing state carried between commands.
struct Stream {
    label: &'static str,
    rx: Receiver<Vec<u8>>,
    /// Bytes received but not yet attributed to a command.
    carry: Vec<u8>,
    /// Sentinels written but not yet read, oldest first.
    pending: VecDeque<String>,
}

/// Exclusively owned shell process. Killed and reaped on [`BashSession::stop`]
/// and on drop.
pub struct BashSession {
    config: BashConfig,
    state: SessionState,
    commands_run: u64,
}

impl BashSession {
    pub fn new(config: BashConfig) -> Self {
        Self {
            config,
            state: SessionState::NotStarted,
            commands_run: 0,
        }
    }

    pub fn status(&self) -> SessionStatus {
        match self.state {
            SessionState::NotStarted => SessionStatus::NotStarted,
            SessionState::Running(_) => SessionStatus::Running,
            SessionState::Stopped => SessionStatus::Stopped,
        }
    }

    /// Spawn the shell. Only valid once, from `NotStarted`.
    #[instrument(skip_all, fields(shell = %self.config.shell))]
    pub fn start(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::NotStarted => {}
            SessionState::Running(_) => return Err(SessionError::AlreadyStarted),
            SessionState::Stopped => return Err(SessionError::Stopped),
        }

        let mut child = Command::new(&self.config.shell)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| SessionError::Spawn {
                shell: self.config.shell.clone(),
                message: err.to_string(),
            })?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SessionError::Io("shell streams were not piped".to_string()));
        };

        info!(pid = child.id(), "bash session started");
        self.state = SessionState::Running(Shell {
            child,
            stdin,
            stdout: Stream::new("stdout", spawn_reader(stdout)),
            stderr: Stream::new("stderr", spawn_reader(stderr)),
        });
        Ok(())
    }

    /// Run one command and wait for its sentinel on both streams.
    ///
    /// A timeout leaves the session running; output the command produces
    /// later is skipped by the next command, which gets a fresh timeout once
    /// the late command has finished. If the shell exits the session moves
    /// to `Stopped`.
    #[instrument(skip_all, fields(command_len = command.len()))]
    pub fn run(&mut self, command: &str) -> Result<BashOutput, SessionError> {
        let shell = match &mut self.state {
            SessionState::NotStarted => return Err(SessionError::NotStarted),
            SessionState::Stopped => return Err(SessionError::Stopped),
            SessionState::Running(shell) => shell,
        };

        self.commands_run += 1;
        let sentinel = format!("__agent_done_{}_{}__", shell.child.id(), self.commands_run);
        let result = shell.execute(
            command,
            &sentinel,
            self.config.timeout(),
            self.config.output_limit_bytes,
        );

        if matches!(result, Err(SessionError::Exited)) {
            warn!("shell exited while running a command");
            self.release();
        }
        result
    }

    /// Terminate the shell. Idempotent.
    pub fn stop(&mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let SessionState::Running(mut shell) =
            std::mem::replace(&mut self.state, SessionState::Stopped)
        {
            shell.kill();
        }
    }
}

impl Drop for BashSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl Shell {
    fn execute(
        &mut self,
        command: &str,
        sentinel: &str,
        timeout: Duration,
        output_limit_bytes: usize,
    ) -> Result<BashOutput, SessionError> {
        let idle = self.stdout.discard_idle() + self.stderr.discard_idle();
        if idle > 0 {
            debug!(idle_bytes = idle, "discarded output produced between commands");
        }
        if let Ok(Some(status)) = self.child.try_wait() {
            debug!(exit_code = ?status.code(), "shell already exited");
            return Err(SessionError::Exited);
        }

        let script =
            format!("{{ {command}\n}} </dev/null\necho '{sentinel}'\necho '{sentinel}' >&2\n");
        if let Err(err) = self
            .stdin
            .write_all(script.as_bytes())
            .and_then(|()| self.stdin.flush())
        {
            return Err(if err.kind() == ErrorKind::BrokenPipe {
                SessionError::Exited
            } else {
                SessionError::Io(err.to_string())
            });
        }
        self.stdout.expect(sentinel);
        self.stderr.expect(sentinel);

        let deadline = Instant::now() + timeout;
        self.stdout.skip_stale(sentinel, deadline, timeout)?;
        self.stderr.skip_stale(sentinel, deadline, timeout)?;

        let deadline = Instant::now() + timeout;
        let stdout = self.stdout.collect(sentinel, deadline, timeout)?;
        let stderr = self.stderr.collect(sentinel, deadline, timeout)?;
        debug!(
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "command finished"
        );
        Ok(BashOutput {
            stdout: cap_output(stdout, output_limit_bytes, "stdout"),
            stderr: cap_output(stderr, output_limit_bytes, "stderr"),
        })
    }

    fn kill(&mut self) {
        match self.child.try_wait() {
            Ok(Some(_)) => {}
            _ => {
                if let Err(err) = self.child.kill() {
                    debug!(err = %err, "kill shell");
                }
            }
        }
        if let Err(err) = self.child.wait() {
            warn!(err = %err, "failed to reap shell");
        }
        info!(pid = self.child.id(), "bash session stopped");
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(chunk[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    debug!(err = %err, "shell stream read failed");
                    break;
                }
            }
        }
    });
    rx
}

impl Stream {
    fn new(label: &'static str, rx: Receiver<Vec<u8>>) -> Self {
        Self {
            label,
            rx,
            carry: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// Drop output nobody waits for. Kept while stale sentinels are queued,
    /// since the bytes may contain them.
    fn discard_idle(&mut self) -> usize {
        if !self.pending.is_empty() {
            return 0;
        }
        let queued: usize = self.rx.try_iter().map(|chunk| chunk.len()).sum();
        let dropped = self.carry.len() + queued;
        self.carry.clear();
        dropped
    }

    fn expect(&mut self, sentinel: &str) {
        self.pending.push_back(sentinel.to_string());
    }

    /// Read past every sentinel queued before `current`, discarding the output.
    fn skip_stale(
        &mut self,
        current: &str,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        while let Some(stale) = self.pending.front().filter(|s| *s != current).cloned() {
            let late = self.read_until(&stale, deadline, timeout)?;
            self.pending.pop_front();
            debug!(
                stream = self.label,
                late_bytes = late.len(),
                "skipped output of a timed out command"
            );
        }
        Ok(())
    }

    /// Output up to `sentinel`, which must be the oldest pending one.
    fn collect(
        &mut self,
        sentinel: &str,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<Vec<u8>, SessionError> {
        let output = self.read_until(sentinel, deadline, timeout)?;
        self.pending.pop_front();
        Ok(output)
    }

    /// Bytes before the first `sentinel`. The sentinel line itself is consumed
    /// and anything after it stays in `carry`.
    fn read_until(
        &mut self,
        sentinel: &str,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<Vec<u8>, SessionError> {
        let needle = sentinel.as_bytes();
        let mut searched = 0;
        loop {
            if let Some(pos) = find(&self.carry[searched..], needle) {
                let start = searched + pos;
                let mut end = start + needle.len();
                if self.carry.get(end) == Some(&b'\n') {
                    end += 1;
                }
                let output = self.carry[..start].to_vec();
                self.carry.drain(..end);
                return Ok(output);
            }
            searched = self.carry.len().saturating_sub(needle.len() - 1);

            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(chunk) => self.carry.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        stream = self.label,
                        timeout_secs = timeout.as_secs(),
                        "bash command timed out"
                    );
                    return Err(SessionError::Timeout(timeout));
                }
                Err(RecvTimeoutError::Disconnected) => return Err(SessionError::Exited),
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn cap_output(bytes: Vec<u8>, limit: usize, label: &str) -> String {
    if bytes.len() <= limit {
        return String::from_utf8_lossy(&bytes).into_owned();
    }
    let truncated = bytes.len() - limit;
    warn!(truncated, stream = label, "bash output truncated");
    let mut text = String::from_utf8_lossy(&bytes[..limit]).into_owned();
    text.push_str(&format!("\n[{label} truncated {truncated} bytes]"));
    text
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn config() -> BashConfig {
        BashConfig {
            shell: "/bin/sh".to_string(),
            timeout_secs: 5,
            output_limit_bytes: 1024,
        }
    }

    #[test]
    fn run_before_start_fails() {
        let mut session = BashSession::new(config());
        let err = session.run("echo hi").unwrap_err();
        assert!(matches!(err, SessionError::NotStarted));
        assert_eq!(session.status(), SessionStatus::NotStarted);
    }

    #[test]
    fn start_twice_fails() {
        let mut session = BashSession::new(config());
        session.start().expect("start");
        assert!(matches!(
            session.start().unwrap_err(),
            SessionError::AlreadyStarted
        ));
    }

    #[test]
    fn run_strips_sentinel() {
        let mut session = BashSession::new(config());
        session.start().expect("start");
        let output = session.run("echo hello").expect("run");
        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "");
    }

    #[test]
    fn run_after_stop_fails_and_stop_is_idempotent() {
        let mut session = BashSession::new(config());
        session.start().expect("start");
        session.stop();
        session.stop();
        assert_eq!(session.status(), SessionStatus::Stopped);
        assert!(matches!(
            session.run("echo hi").unwrap_err(),
            SessionError::Stopped
        ));
    }

    #[test]
    fn spawn_failure_is_session_error() {
        let mut session = BashSession::new(BashConfig {
            shell: "/definitely/not/a/shell".to_string(),
            ..config()
        });
        assert!(matches!(
            session.start().unwrap_err(),
            SessionError::Spawn { .. }
        ));
    }

    #[test]
    fn result_text_falls_back_to_stderr() {
        let output = BashOutput {
            stdout: String::new(),
            stderr: "boom".to_string(),
        };
        assert_eq!(output.into_result_text(), "boom");

        let output = BashOutput {
            stdout: "ok".to_string(),
            stderr: "warn".to_string(),
        };
        assert_eq!(output.into_result_text(), "ok");
    }

    #[test]
    fn cap_output_appends_notice() {
        let text = cap_output(b"abcdef".to_vec(), 3, "stdout");
        assert_eq!(text, "abc\n[stdout truncated 3 bytes]");
        assert_eq!(cap_output(b"abc".to_vec(), 3, "stdout"), "abc");
    }

    fn stream_of(chunks: &[&str]) -> Stream {
        let (tx, rx) = mpsc::channel();
        for chunk in chunks {
            tx.send(chunk.as_bytes().to_vec()).expect("send");
        }
        Stream::new("stdout", rx)
    }

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(1)
    }

    #[test]
    fn sentinel_split_across_chunks_is_found() {
        let mut stream = stream_of(&["out\n__do", "ne__\nnext"]);
        stream.expect("__done__");
        let output = stream
            .collect("__done__", soon(), Duration::from_secs(1))
            .expect("collect");
        assert_eq!(output, b"out\n");
        assert_eq!(stream.carry, b"next");
        assert!(stream.pending.is_empty());
    }

    #[test]
    fn stale_sentinels_are_skipped_before_collecting() {
        let mut stream = stream_of(&["late\n__s1__\nfre", "sh\n__s2__\n"]);
        stream.expect("__s1__");
        stream.expect("__s2__");
        stream
            .skip_stale("__s2__", soon(), Duration::from_secs(1))
            .expect("skip");
        let output = stream
            .collect("__s2__", soon(), Duration::from_secs(1))
            .expect("collect");
        assert_eq!(output, b"fresh\n");
        assert!(stream.pending.is_empty());
    }

    #[test]
    fn idle_output_is_kept_while_sentinels_are_pending() {
        let mut stream = stream_of(&["late\n__s1__\n"]);
        stream.expect("__s1__");
        assert_eq!(stream.discard_idle(), 0);
        stream
            .skip_stale("__s2__", soon(), Duration::from_secs(1))
            .expect("skip");
        assert_eq!(stream.discard_idle(), 0);
    }

    #[test]
    fn closed_stream_reports_exit() {
        let mut stream = stream_of(&["partial"]);
        stream.expect("__s__");
        assert!(matches!(
            stream.collect("__s__", soon(), Duration::from_secs(1)),
            Err(SessionError::Exited)
        ));
    }

    #[test]
    fn find_locates_needle() {
        assert_eq!(find(b"xx__s__", b"__s__"), Some(2));
        assert_eq!(find(b"xx", b"__s__"), None);
    }
}
