//! Test-only helpers: deterministic plans, a scripted Gateway and a fake code
//! runner.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use serde_json::{Value, json};

use crate::cancel::CancelToken;
use crate::core::error::GatewayError;
use crate::core::tools::{PLANNING, TERMINATE};
use crate::core::types::{Plan, StepState, ToolCall};
use crate::io::code::CodeRunner;
use crate::io::gateway::{Gateway, GatewayRequest, GatewayResponse};

/// Create a plan whose step `i` has content `step {i}` and the given state.
pub fn plan_with_states(states: &[StepState]) -> Plan {
    let mut plan = Plan::new(
        "plan_test",
        "Test plan",
        (0..states.len()).map(|i| format!("step {i}")),
    );
    for (step, state) in plan.steps.iter_mut().zip(states) {
        step.state = *state;
    }
    plan
}

/// Tool call with JSON-encoded arguments.
pub fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall::new(id, name, arguments.to_string())
}

/// Gateway response carrying text and tool calls.
pub fn response(content: &str, tool_calls: Vec<ToolCall>) -> GatewayResponse {
    GatewayResponse {
        content: content.to_string(),
        tool_calls,
    }
}

/// Planning response with a single `planning create` call.
pub fn planning_response(title: &str, steps: &[&str]) -> GatewayResponse {
    response(
        "",
        vec![tool_call(
            "call_plan",
            PLANNING,
            json!({"command": "create", "title": title, "steps": steps}),
        )],
    )
}

/// Response whose only tool call is `terminate` with `status`.
pub fn terminate_response(status: &str) -> GatewayResponse {
    response(
        "",
        vec![tool_call("call_end", TERMINATE, json!({"status": status}))],
    )
}

/// Gateway that replays queued results and records every request.
///
/// Once the queue is empty every call fails with
/// `GatewayError::InvalidResponse`.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Result<GatewayResponse, GatewayError>>>,
    requests: Mutex<Vec<GatewayRequest>>,
}

impl ScriptedGateway {
    pub fn new(responses: impl IntoIterator<Item = GatewayResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn then_fail(self, error: GatewayError) -> Self {
        self.script
            .lock()
            .expect("script lock")
            .push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

impl Gateway for ScriptedGateway {
    fn invoke(&self, request: &GatewayRequest, cancel: &CancelToken) -> Result<GatewayResponse> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        if cancel.is_cancelled() {
            return Err(GatewayError::Cancelled.into());
        }
        let next = self.script.lock().expect("script lock").pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(err)) => Err(err.into()),
            None => Err(GatewayError::InvalidResponse("script exhausted".to_string()).into()),
        }
    }
}

/// Code runner that records snippets and answers with a fixed prefix.
#[derive(Default)]
pub struct FakeCodeRunner {
    pub executed: Mutex<Vec<String>>,
}

impl CodeRunner for FakeCodeRunner {
    fn execute(&self, code: &str) -> Result<String> {
        self.executed
            .lock()
            .expect("executed lock")
            .push(code.to_string());
        Ok(format!("ran: {code}"))
    }
}
