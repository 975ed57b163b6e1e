//! Tool-calling execution loop.
//!
//! One [`ExecutionLoop`] lives for a whole plan execution. Its conversation
//! history accumulates across steps. Each [`ExecutionLoop::run`] performs
//! exactly one Gateway round trip followed by one dispatch pass over the
//! returned tool calls.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelToken;
use crate::core::error::{SessionError, ToolArgumentError};
use crate::core::schemas::execution_tools;
use crate::core::tool_args::{
    BashArgs, ChatCompletionArgs, CodeArgs, TerminateArgs, TerminateStatus, decode_args,
};
use crate::core::tools::ToolKind;
use crate::core::types::{Msg, Role, ToolCall};
use crate::io::bash::BashSession;
use crate::io::code::CodeRunner;
use crate::io::config::{AgentConfig, BashConfig};
use crate::io::gateway::{Gateway, GatewayRequest};
use crate::io::prompt::{executor_system, tool_directive};

const SKIPPED_AFTER_TERMINATE: &str = "Skipped: the interaction was terminated earlier in this response.";

/// Result of one invocation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleResult {
    /// Raw `terminate` arguments, joined dispatch outputs, or assistant text.
    pub text: String,
    /// Set when the model called `terminate`.
    pub termination: Option<TerminateStatus>,
}

/// Settings for an [`ExecutionLoop`].
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub bash: BashConfig,
    /// Keep at most this many history messages (0 = unbounded).
    pub history_limit: usize,
    pub step_timeout: Duration,
}

impl LoopSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            bash: config.bash.clone(),
            history_limit: config.executor.history_limit,
            step_timeout: Duration::from_secs(config.executor.step_timeout_secs),
        }
    }
}

/// Conversation state plus the tools it dispatches to.
///
/// The bash session is started on the first `bash` call and stopped when the
/// loop is dropped.
pub struct ExecutionLoop<G, C> {
    gateway: G,
    code_runner: C,
    settings: LoopSettings,
    bash: Option<BashSession>,
    history: Vec<Msg>,
}

impl<G: Gateway, C: CodeRunner> ExecutionLoop<G, C> {
    pub fn new(gateway: G, code_runner: C, settings: LoopSettings) -> Self {
        Self {
            gateway,
            code_runner,
            settings,
            bash: None,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Msg] {
        &self.history
    }

    /// Append `instruction` as a user turn and perform one invocation cycle.
    #[instrument(skip_all, fields(history = self.history.len()))]
    pub fn run(&mut self, instruction: &str, cancel: &CancelToken) -> Result<CycleResult> {
        self.history.push(Msg::user(instruction));
        prune_history(&mut self.history, self.settings.history_limit);

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(Msg::system(executor_system()));
        messages.extend(self.history.iter().cloned());
        messages.push(Msg::user(tool_directive()));
        let request = GatewayRequest::new(messages, execution_tools())
            .with_deadline(Instant::now() + self.settings.step_timeout);

        let response = self
            .gateway
            .invoke(&request, cancel)
            .context("execution loop gateway call")?;
        debug!(
            tool_calls = response.tool_calls.len(),
            content_len = response.content.len(),
            "gateway responded"
        );
        self.history.push(Msg::assistant(
            response.content.clone(),
            response.tool_calls.clone(),
        ));

        let mut outputs: Vec<String> = Vec::new();
        let mut terminated: Option<(TerminateStatus, String)> = None;
        for call in &response.tool_calls {
            if terminated.is_some() {
                self.history
                    .push(Msg::tool(&call.id, SKIPPED_AFTER_TERMINATE));
                continue;
            }
            match ToolKind::from_name(&call.name) {
                ToolKind::Terminate => {
                    let status = terminate_status(call);
                    info!(status = status.as_str(), "model terminated the interaction");
                    self.history.push(Msg::tool(
                        &call.id,
                        format!(
                            "The interaction has been completed with status: {}",
                            status.as_str()
                        ),
                    ));
                    terminated = Some((status, call.arguments.clone()));
                }
                ToolKind::Unknown => {
                    warn!(tool = %call.name, "ignoring unknown tool call");
                    self.history.push(Msg::tool(
                        &call.id,
                        format!("Tool `{}` is not available; the call was ignored.", call.name),
                    ));
                }
                kind => {
                    let output = match self.dispatch(kind, call) {
                        Ok(output) => output,
                        Err(err) => {
                            self.history
                                .push(Msg::tool(&call.id, format!("Error: {err}")));
                            return Err(err).with_context(|| format!("tool call {}", call.name));
                        }
                    };
                    self.history.push(Msg::tool(&call.id, output.clone()));
                    outputs.push(output);
                }
            }
        }

        let result = match terminated {
            Some((status, raw)) => CycleResult {
                text: raw,
                termination: Some(status),
            },
            None if !outputs.is_empty() => CycleResult {
                text: outputs.join("\n"),
                termination: None,
            },
            None => CycleResult {
                text: response.content,
                termination: None,
            },
        };
        Ok(result)
    }

    /// Run one non-terminating tool. Argument errors become result text.
    fn dispatch(&mut self, kind: ToolKind, call: &ToolCall) -> Result<String, SessionError> {
        debug!(tool = %call.name, id = %call.id, "dispatching tool call");
        let output = match kind {
            ToolKind::ChatCompletion => match decode_args::<ChatCompletionArgs>(&call.arguments) {
                Ok(args) => args.response,
                Err(err) => argument_error_text(&err),
            },
            ToolKind::CodeExecute => match decode_args::<CodeArgs>(&call.arguments) {
                Ok(args) => match self.code_runner.execute(&args.code) {
                    Ok(output) => output,
                    Err(err) => {
                        warn!(err = %err, "code runner failed");
                        format!("Error: code execution failed: {err:#}")
                    }
                },
                Err(err) => argument_error_text(&err),
            },
            ToolKind::Bash => match decode_args::<BashArgs>(&call.arguments) {
                Ok(args) => self.bash_session()?.run(&args.command)?.into_result_text(),
                Err(err) => argument_error_text(&err),
            },
            ToolKind::Terminate | ToolKind::Unknown => String::new(),
        };
        Ok(output)
    }

    fn bash_session(&mut self) -> Result<&mut BashSession, SessionError> {
        if self.bash.is_none() {
            let mut session = BashSession::new(self.settings.bash.clone());
            session.start()?;
            self.bash = Some(session);
        }
        self.bash.as_mut().ok_or(SessionError::NotStarted)
    }
}

fn terminate_status(call: &ToolCall) -> TerminateStatus {
    match decode_args::<TerminateArgs>(&call.arguments) {
        Ok(args) => args.status,
        Err(err) => {
            warn!(err = %err, "undecodable terminate arguments, treating as success");
            TerminateStatus::Success
        }
    }
}

fn argument_error_text(err: &ToolArgumentError) -> String {
    warn!(err = %err, "invalid tool arguments");
    format!("Error: {err}")
}

/// Keep the newest `limit` messages without leaving tool replies whose
/// assistant message was dropped.
fn prune_history(history: &mut Vec<Msg>, limit: usize) {
    if limit == 0 || history.len() <= limit {
        return;
    }
    let mut start = history.len() - limit;
    while start < history.len() && history[start].role == Role::Tool {
        start += 1;
    }
    debug!(dropped = start, "pruning conversation history");
    history.drain(..start);
}
