//! Behaviour of the persistent bash session against a real shell.

#![cfg(unix)]

use std::time::{Duration, Instant};

use agent::core::error::SessionError;
use agent::io::bash::{BashSession, SessionStatus};
use agent::io::config::BashConfig;

fn session(timeout_secs: u64) -> BashSession {
    let mut session = BashSession::new(BashConfig {
        shell: "/bin/bash".to_string(),
        timeout_secs,
        output_limit_bytes: 64,
    });
    session.start().expect("start");
    session
}

#[test]
fn shell_state_survives_between_commands() {
    let mut session = session(5);
    session.run("export GREETING=hello").expect("export");
    session.run("cd /").expect("cd");
    let output = session.run("echo $GREETING; pwd").expect("run");
    assert_eq!(output.stdout, "hello\n/\n");
}

#[test]
fn stderr_is_captured_separately() {
    let mut session = session(5);
    let output = session.run("echo out; echo err >&2").expect("run");
    assert_eq!(output.stdout, "out\n");
    assert_eq!(output.stderr, "err\n");
}

#[test]
fn output_without_trailing_newline_is_kept() {
    let mut session = session(5);
    let output = session.run("printf abc").expect("run");
    assert_eq!(output.stdout, "abc");
}

#[test]
fn long_output_is_truncated() {
    let mut session = session(5);
    let output = session.run("seq 1 1000").expect("run");
    assert!(output.stdout.starts_with("1\n2\n3\n"));
    assert!(output.stdout.contains("[stdout truncated"));
}

#[test]
fn timeout_returns_error_and_keeps_session_running() {
    let mut session = session(1);
    let started = Instant::now();
    let err = session.run("sleep 3").unwrap_err();
    assert!(matches!(err, SessionError::Timeout(d) if d == Duration::from_secs(1)));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(session.status(), SessionStatus::Running);
    session.stop();
    assert_eq!(session.status(), SessionStatus::Stopped);
}

#[test]
fn output_of_timed_out_command_does_not_leak() {
    let mut session = session(2);
    assert!(session.run("sleep 3; echo late; echo oops >&2").is_err());
    let output = session.run("echo fresh").expect("run");
    assert_eq!(output.stdout, "fresh\n");
    assert_eq!(output.stderr, "");
}

#[test]
fn late_command_does_not_eat_the_next_timeout() {
    let mut session = session(1);
    assert!(matches!(
        session.run("sleep 2").unwrap_err(),
        SessionError::Timeout(_)
    ));
    let output = session.run("echo fresh").expect("run");
    assert_eq!(output.stdout, "fresh\n");
}

#[test]
fn commands_reading_stdin_see_end_of_input() {
    let mut session = session(5);
    let output = session.run("read x; echo got:$x").expect("read");
    assert_eq!(output.stdout, "got:\n");
    let output = session.run("cat; echo after").expect("cat");
    assert_eq!(output.stdout, "after\n");
}

#[test]
fn shell_exit_stops_the_session() {
    let mut session = session(5);
    let err = session.run("exit 3").unwrap_err();
    assert!(matches!(err, SessionError::Exited));
    assert_eq!(session.status(), SessionStatus::Stopped);
    assert!(matches!(
        session.run("echo hi").unwrap_err(),
        SessionError::Stopped
    ));
}
