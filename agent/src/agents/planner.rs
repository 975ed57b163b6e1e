//! Planning Service: one Gateway call turns a task into a [`Plan`].

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::cancel::CancelToken;
use crate::core::error::{PlanCreationError, ToolArgumentError};
use crate::core::schemas::planning_schema;
use crate::core::tool_args::{PlanCommand, PlanningArgs, decode_args};
use crate::core::tools::PLANNING;
use crate::core::types::{Msg, Plan, ToolCall};
use crate::io::gateway::{Gateway, GatewayRequest, GatewayResponse};
use crate::io::prompt::{planner_request, planner_system};

/// Builds plans from free-text tasks. No retries.
#[derive(Debug, Clone, Default)]
pub struct PlanningAgent;

impl PlanningAgent {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip_all, fields(task_len = task.len()))]
    pub fn create_plan<G: Gateway>(
        &self,
        gateway: &G,
        task: &str,
        cancel: &CancelToken,
    ) -> Result<Plan> {
        let messages = vec![Msg::system(planner_system()), Msg::user(planner_request(task)?)];
        let request = GatewayRequest::new(messages, vec![planning_schema()]);
        let response = gateway
            .invoke(&request, cancel)
            .context("planning gateway call")?;
        let plan = plan_from_response(&response)?;
        info!(plan_id = %plan.id, steps = plan.steps.len(), "plan created");
        Ok(plan)
    }
}

/// Extract the plan from the single `planning create` call in `response`.
pub fn plan_from_response(response: &GatewayResponse) -> Result<Plan, PlanCreationError> {
    if response.tool_calls.is_empty() {
        warn!("planning response had no tool calls");
        return Err(PlanCreationError::NoToolCalls);
    }

    let planning: Vec<&ToolCall> = response
        .tool_calls
        .iter()
        .filter(|call| call.name == PLANNING)
        .collect();
    let call = match planning.as_slice() {
        [call] => *call,
        [] => {
            let names = response
                .tool_calls
                .iter()
                .map(|call| call.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(PlanCreationError::MissingPlanningCall { names });
        }
        calls => {
            return Err(PlanCreationError::AmbiguousPlanningCalls { count: calls.len() });
        }
    };

    let args: PlanningArgs = decode_args(&call.arguments)?;
    if args.command != PlanCommand::Create {
        return Err(PlanCreationError::UnsupportedCommand(
            args.command.as_str().to_string(),
        ));
    }
    let title = args.title.ok_or_else(|| missing_field("title"))?;
    let steps = args.steps.ok_or_else(|| missing_field("steps"))?;
    let id = args
        .plan_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(generate_plan_id);

    Ok(Plan::new(id, title, steps))
}

fn missing_field(field: &str) -> PlanCreationError {
    PlanCreationError::InvalidArguments(ToolArgumentError::MissingField {
        tool: PLANNING.to_string(),
        field: field.to_string(),
    })
}

fn generate_plan_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("plan_{millis}")
}
