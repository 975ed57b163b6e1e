//! Typed tool-call payloads with field-level validation.
//!
//! Every tool has one payload struct. Decoding checks, in order: valid JSON,
//! JSON object, required fields present, conformance to the tool's own
//! JSON Schema. Each failure produces a [`ToolArgumentError`] naming the tool
//! and, where possible, the field.

use jsonschema::Draft;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::error::ToolArgumentError;
use crate::core::schemas::{
    bash_schema, chat_completion_schema, code_execute_schema, planning_schema, terminate_schema,
};
use crate::core::types::{StepState, ToolSchema};

/// A payload that can be decoded from raw tool-call arguments.
pub trait ToolArgs: DeserializeOwned {
    fn schema() -> ToolSchema;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BashArgs {
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CodeArgs {
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminateStatus {
    Success,
    Failure,
}

impl TerminateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminateStatus::Success => "success",
            TerminateStatus::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TerminateArgs {
    pub status: TerminateStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatCompletionArgs {
    pub response: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanCommand {
    Create,
    Update,
    List,
    Get,
    SetActive,
    MarkStep,
    Delete,
}

impl PlanCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanCommand::Create => "create",
            PlanCommand::Update => "update",
            PlanCommand::List => "list",
            PlanCommand::Get => "get",
            PlanCommand::SetActive => "set_active",
            PlanCommand::MarkStep => "mark_step",
            PlanCommand::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlanningArgs {
    pub command: PlanCommand,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub steps: Option<Vec<String>>,
    #[serde(default)]
    pub step_index: Option<u64>,
    #[serde(default)]
    pub step_status: Option<StepState>,
    #[serde(default)]
    pub step_notes: Option<String>,
}

impl ToolArgs for BashArgs {
    fn schema() -> ToolSchema {
        bash_schema()
    }
}

impl ToolArgs for CodeArgs {
    fn schema() -> ToolSchema {
        code_execute_schema()
    }
}

impl ToolArgs for TerminateArgs {
    fn schema() -> ToolSchema {
        terminate_schema()
    }
}

impl ToolArgs for ChatCompletionArgs {
    fn schema() -> ToolSchema {
        chat_completion_schema()
    }
}

impl ToolArgs for PlanningArgs {
    fn schema() -> ToolSchema {
        planning_schema()
    }
}

/// Decode raw tool-call arguments into `T`.
pub fn decode_args<T: ToolArgs>(raw: &str) -> Result<T, ToolArgumentError> {
    let schema = T::schema();
    let tool = schema.name.clone();

    let value: Value = serde_json::from_str(raw).map_err(|err| ToolArgumentError::Malformed {
        tool: tool.clone(),
        message: err.to_string(),
    })?;
    let Some(object) = value.as_object() else {
        return Err(ToolArgumentError::NotAnObject { tool });
    };

    for field in &schema.parameters.required {
        if object.get(field).is_none_or(Value::is_null) {
            return Err(ToolArgumentError::MissingField {
                tool,
                field: field.clone(),
            });
        }
    }

    validate_against_schema(&tool, &value, &schema)?;

    serde_json::from_value(value).map_err(|err| ToolArgumentError::InvalidField {
        tool,
        details: err.to_string(),
    })
}

/// Validate a JSON instance against the tool's parameter schema.
fn validate_against_schema(
    tool: &str,
    instance: &Value,
    schema: &ToolSchema,
) -> Result<(), ToolArgumentError> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema.parameters_json())
        .map_err(|err| ToolArgumentError::InvalidField {
            tool: tool.to_string(),
            details: format!("schema does not compile: {err}"),
        })?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(ToolArgumentError::InvalidField {
            tool: tool.to_string(),
            details: messages.join("; "),
        });
    }
    Ok(())
}
