//! Error taxonomy for planning and execution.
//!
//! Orchestration code returns `anyhow::Result`; these types sit at the root of
//! those error chains so callers can `downcast_ref` to tell failure classes
//! apart.
//!
//! | error | raised by | fatal? |
//! |---|---|---|
//! | [`PlanCreationError`] | planner | aborts planning |
//! | [`SchedulingError`] | scheduler | aborts execution |
//! | [`GatewayError`] | LLM gateway | aborts the step and the plan |
//! | [`ToolArgumentError`] | tool dispatch | recovered into a result string |
//! | [`SessionError`] | bash session | aborts the step and the plan |

use std::time::Duration;

use thiserror::Error;

use crate::core::types::StepState;

/// The planning response did not describe a plan we can create.
#[derive(Debug, Error)]
pub enum PlanCreationError {
    #[error("planning response contained no tool calls")]
    NoToolCalls,

    #[error("planning response has no `planning` tool call (got: {names})")]
    MissingPlanningCall { names: String },

    #[error("planning response has {count} `planning` tool calls, expected exactly one")]
    AmbiguousPlanningCalls { count: usize },

    #[error("planning command must be `create`, got `{0}`")]
    UnsupportedCommand(String),

    #[error("invalid planning arguments: {0}")]
    InvalidArguments(#[from] ToolArgumentError),
}

/// Illegal step index or state transition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    #[error("step index {index} out of range (plan has {len} steps)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("illegal transition for step {index}: {from} -> {to}")]
    IllegalTransition {
        index: usize,
        from: StepState,
        to: StepState,
    },
}

/// A Gateway round trip failed. Never retried.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway transport error: {0}")]
    Transport(String),

    #[error("gateway API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),

    #[error("gateway call cancelled")]
    Cancelled,

    #[error("gateway call exceeded its deadline ({0:?})")]
    DeadlineExceeded(Duration),
}

/// Malformed or missing tool-call fields.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolArgumentError {
    #[error("{tool}: arguments are not valid JSON: {message}")]
    Malformed { tool: String, message: String },

    #[error("{tool}: arguments must be a JSON object")]
    NotAnObject { tool: String },

    #[error("{tool}: missing required field `{field}`")]
    MissingField { tool: String, field: String },

    #[error("{tool}: invalid arguments: {details}")]
    InvalidField { tool: String, details: String },
}

/// Bash session lifecycle or command failure.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("bash session not started")]
    NotStarted,

    #[error("bash session already started")]
    AlreadyStarted,

    #[error("bash session stopped")]
    Stopped,

    #[error("failed to spawn shell `{shell}`: {message}")]
    Spawn { shell: String, message: String },

    #[error("bash session I/O error: {0}")]
    Io(String),

    #[error("bash command timed out after {0:?}")]
    Timeout(Duration),

    #[error("shell exited while running a command")]
    Exited,
}
