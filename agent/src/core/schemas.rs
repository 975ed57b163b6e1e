//! Canonical tool schemas exposed to the model.
//!
//! Schemas are immutable and cheap to build; the execution loop rebuilds the
//! set on every cycle.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::tools::{BASH, CHAT_COMPLETION, CODE_EXECUTE, PLANNING, TERMINATE};
use crate::core::types::{PropertySchema, ToolParameters, ToolSchema};

const PLANNING_DESCRIPTION: &str = "A planning tool that allows the agent to create and manage plans for solving complex tasks.\n\
The tool provides functionality for creating plans, updating plan steps, and tracking progress.";

const CHAT_DESCRIPTION: &str =
    "Creates a structured completion with specified output formatting.";

const TERMINATE_DESCRIPTION: &str = "Terminate the interaction when the request is met OR if the assistant cannot proceed further with the task.\n\
When you have finished all the tasks, call this tool to end the work.";

const CODE_DESCRIPTION: &str = "Executes Golang code string. Note: Only print outputs are visible, function return values are not captured. Use print statements to see results.";

const BASH_DESCRIPTION: &str = r#"Execute a bash command in the terminal.
* Long running commands: For commands that may run indefinitely, it should be run in the background and the output should be redirected to a file, e.g. command = "python3 app.py > server.log 2>&1 &".
* Interactive: If a bash command returns exit code "-1", this means the process is not yet finished. The assistant must then send a second call to terminal with an empty "command" (which will retrieve any additional logs), or it can send additional text (set "command" to the text) to STDIN of the running process, or it can send command="ctrl+c" to interrupt the process.
* Timeout: If a command execution result says "Command timed out. Sending SIGINT to the process", the assistant should retry running the command in the background."#;

pub const PLAN_COMMANDS: [&str; 7] = [
    "create",
    "update",
    "list",
    "get",
    "set_active",
    "mark_step",
    "delete",
];

fn schema(
    name: &str,
    description: &str,
    properties: Vec<(&str, PropertySchema)>,
    required: &[&str],
) -> ToolSchema {
    ToolSchema {
        name: name.to_string(),
        description: description.to_string(),
        parameters: ToolParameters {
            kind: "object".to_string(),
            properties: properties
                .into_iter()
                .map(|(field, prop)| (field.to_string(), prop))
                .collect::<BTreeMap<_, _>>(),
            required: required
                .iter()
                .map(|f| f.to_string())
                .collect::<BTreeSet<_>>(),
        },
    }
}

pub fn planning_schema() -> ToolSchema {
    schema(
        PLANNING,
        PLANNING_DESCRIPTION,
        vec![
            (
                "command",
                PropertySchema::new(
                    "string",
                    "The command to execute. Available commands: create, update, list, get, set_active, mark_step, delete.",
                )
                .with_enum(&PLAN_COMMANDS),
            ),
            (
                "plan_id",
                PropertySchema::new(
                    "string",
                    "Unique identifier for the plan. Required for create, update, set_active, and delete commands. Optional for get and mark_step (uses active plan if not specified).",
                ),
            ),
            (
                "title",
                PropertySchema::new(
                    "string",
                    "Title for the plan. Required for create command, optional for update command.",
                ),
            ),
            (
                "steps",
                PropertySchema::new(
                    "array",
                    "List of plan steps. Required for create command, optional for update command.",
                )
                .with_items("string"),
            ),
            (
                "step_index",
                PropertySchema::new(
                    "integer",
                    "Index of the step to update (0-based). Required for mark_step command.",
                ),
            ),
            (
                "step_status",
                PropertySchema::new(
                    "string",
                    "Status to set for a step. Used with mark_step command.",
                )
                .with_enum(&["not_started", "in_progress", "completed", "blocked"]),
            ),
            (
                "step_notes",
                PropertySchema::new(
                    "string",
                    "Additional notes for a step. Optional for mark_step command.",
                ),
            ),
        ],
        &["command"],
    )
}

pub fn chat_completion_schema() -> ToolSchema {
    schema(
        CHAT_COMPLETION,
        CHAT_DESCRIPTION,
        vec![(
            "response",
            PropertySchema::new(
                "string",
                "The response text that should be delivered to the user.",
            ),
        )],
        &["response"],
    )
}

pub fn terminate_schema() -> ToolSchema {
    schema(
        TERMINATE,
        TERMINATE_DESCRIPTION,
        vec![(
            "status",
            PropertySchema::new("string", "The finish status of the interaction.")
                .with_enum(&["success", "failure"]),
        )],
        &["status"],
    )
}

pub fn code_execute_schema() -> ToolSchema {
    schema(
        CODE_EXECUTE,
        CODE_DESCRIPTION,
        vec![(
            "code",
            PropertySchema::new("string", "The Golang code to execute."),
        )],
        &["code"],
    )
}

pub fn bash_schema() -> ToolSchema {
    schema(
        BASH,
        BASH_DESCRIPTION,
        vec![(
            "command",
            PropertySchema::new(
                "string",
                "The bash command to execute. Can be empty to view additional logs when previous exit code is `-1`. Can be `ctrl+c` to interrupt the currently running process.",
            ),
        )],
        &["command"],
    )
}

/// Tool set offered on every execution-loop cycle, in request order.
pub fn execution_tools() -> Vec<ToolSchema> {
    vec![
        chat_completion_schema(),
        terminate_schema(),
        code_execute_schema(),
        bash_schema(),
    ]
}
