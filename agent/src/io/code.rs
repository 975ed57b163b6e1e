//! Code-execution adapters for the `golang_execute` tool.

use std::fs;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::io::config::CodeConfig;
use crate::io::process::run_command_with_timeout;

/// Executes a code snippet and returns its printed output.
///
/// Failures of the snippet itself (compile errors, non-zero exit, timeout) are
/// part of the returned text. `Err` is reserved for failures of the runner.
pub trait CodeRunner {
    fn execute(&self, code: &str) -> Result<String>;
}

impl<R: CodeRunner + ?Sized> CodeRunner for Box<R> {
    fn execute(&self, code: &str) -> Result<String> {
        (**self).execute(code)
    }
}

impl<R: CodeRunner + ?Sized> CodeRunner for std::sync::Arc<R> {
    fn execute(&self, code: &str) -> Result<String> {
        (**self).execute(code)
    }
}

/// Returns the code verbatim. Deterministic stand-in for a real toolchain.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoRunner;

impl CodeRunner for EchoRunner {
    fn execute(&self, code: &str) -> Result<String> {
        Ok(code.to_string())
    }
}

/// Runs snippets with `go run` in a scratch directory.
#[derive(Debug, Clone)]
pub struct GoRunner {
    timeout: Duration,
    output_limit_bytes: usize,
}

impl GoRunner {
    pub fn new(timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            timeout,
            output_limit_bytes,
        }
    }
}

impl CodeRunner for GoRunner {
    fn execute(&self, code: &str) -> Result<String> {
        let dir = tempfile::tempdir().context("create go scratch dir")?;
        let main = dir.path().join("main.go");
        fs::write(&main, code).with_context(|| format!("write {}", main.display()))?;

        let mut cmd = Command::new("go");
        cmd.arg("run").arg(&main).current_dir(dir.path());
        debug!(bytes = code.len(), "running go snippet");

        let output = match run_command_with_timeout(cmd, self.timeout, self.output_limit_bytes) {
            Ok(output) => output,
            Err(err) => {
                warn!(err = %err, "go toolchain unavailable");
                return Ok(format!("Failed to run go: {err:#}"));
            }
        };

        let mut text = output.combined_text("go");
        if output.timed_out {
            text.push_str(&format!(
                "\nExecution timed out after {}s",
                self.timeout.as_secs()
            ));
        } else if !output.status.success() {
            text.push_str(&format!("\nExit status: {}", output.status));
        }
        info!(timed_out = output.timed_out, exit_code = ?output.status.code(), "go snippet finished");
        Ok(text)
    }
}

/// Build the runner named by `code.runner`.
pub fn runner_from_config(config: &CodeConfig) -> Box<dyn CodeRunner> {
    match config.runner.as_str() {
        "echo" => Box::new(EchoRunner),
        _ => Box::new(GoRunner::new(
            Duration::from_secs(config.timeout_secs),
            config.output_limit_bytes,
        )),
    }
}
