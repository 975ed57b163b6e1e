//! Closed set of tools the execution loop can dispatch.

/// Tool used only by the planner.
pub const PLANNING: &str = "planning";
pub const CHAT_COMPLETION: &str = "create_chat_completion";
pub const TERMINATE: &str = "terminate";
pub const CODE_EXECUTE: &str = "golang_execute";
pub const BASH: &str = "bash";

/// Dispatch variant for a model-issued tool call.
///
/// Unrecognized names map to `Unknown` so they show up in logs and history
/// instead of vanishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Terminate,
    CodeExecute,
    Bash,
    ChatCompletion,
    Unknown,
}

impl ToolKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            TERMINATE => ToolKind::Terminate,
            CODE_EXECUTE => ToolKind::CodeExecute,
            BASH => ToolKind::Bash,
            CHAT_COMPLETION => ToolKind::ChatCompletion,
            _ => ToolKind::Unknown,
        }
    }
}
