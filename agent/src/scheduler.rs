//! Plan Scheduler: drives a plan's steps through the execution loop.
//!
//! Steps run strictly in index order, one at a time. A step is marked
//! `InProgress` before it is handed to the loop and `Completed` (or `Blocked`
//! on a failed `terminate`) only after the loop returns. Any error halts the
//! plan and leaves the current step `InProgress`.

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::agents::executor::ExecutionLoop;
use crate::cancel::CancelToken;
use crate::core::error::GatewayError;
use crate::core::report::format_plan;
use crate::core::selector::{first_not_started, is_last};
use crate::core::state_update::mark_step;
use crate::core::tags::step_tag;
use crate::core::tool_args::TerminateStatus;
use crate::core::types::{Plan, StepState};
use crate::io::code::CodeRunner;
use crate::io::gateway::Gateway;
use crate::io::prompt::{StepPrompt, step_instruction};

/// What happened to one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub index: usize,
    pub state: StepState,
    pub result: String,
    pub tag: Option<String>,
}

/// Execute every not-started step of `plan` in order.
///
/// `on_step` sees the plan right after each step settles.
#[instrument(skip_all, fields(plan_id = %plan.id, steps = plan.steps.len()))]
pub fn execute_plan<G, C, F>(
    plan: &mut Plan,
    exec: &mut ExecutionLoop<G, C>,
    cancel: &CancelToken,
    mut on_step: F,
) -> Result<()>
where
    G: Gateway,
    C: CodeRunner,
    F: FnMut(&Plan, &StepOutcome),
{
    while let Some(index) = first_not_started(plan) {
        if cancel.is_cancelled() {
            warn!(index, "plan execution cancelled");
            return Err(GatewayError::Cancelled.into());
        }

        mark_step(plan, index, StepState::InProgress, None)?;
        let content = plan.steps[index].content.clone();
        let tag = step_tag(&content).map(str::to_string);
        info!(index, tag = tag.as_deref().unwrap_or("-"), "executing step");

        let report = format_plan(plan);
        let instruction = step_instruction(&StepPrompt {
            report: &report,
            index,
            content: &content,
            tag: tag.as_deref(),
        })?;
        let cycle = exec
            .run(&instruction, cancel)
            .with_context(|| format!("execute step {index}"))?;

        let state = match cycle.termination {
            Some(TerminateStatus::Failure) => StepState::Blocked,
            _ => StepState::Completed,
        };
        mark_step(plan, index, state, Some(cycle.text.clone()))?;
        info!(index, state = %state, "step finished");

        on_step(
            plan,
            &StepOutcome {
                index,
                state,
                result: cycle.text,
                tag,
            },
        );

        if is_last(plan, index) {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::executor::LoopSettings;
    use crate::core::error::SchedulingError;
    use crate::io::config::BashConfig;
    use crate::test_support::{
        FakeCodeRunner, ScriptedGateway, response, terminate_response, tool_call,
    };
    use serde_json::json;
    use std::time::Duration;

    fn settings() -> LoopSettings {
        LoopSettings {
            bash: BashConfig::default(),
            history_limit: 0,
            step_timeout: Duration::from_secs(60),
        }
    }

    fn three_step_plan() -> Plan {
        Plan::new("p1", "Ship it", ["Write code", "[TEST] Run tests", "Release"])
    }

    #[test]
    fn completes_steps_in_ascending_order() {
        let gateway = ScriptedGateway::new([
            response("wrote", Vec::new()),
            response("tested", Vec::new()),
            response("released", Vec::new()),
        ]);
        let mut exec = ExecutionLoop::new(&gateway, FakeCodeRunner::default(), settings());
        let mut plan = three_step_plan();
        let mut seen = Vec::new();

        execute_plan(&mut plan, &mut exec, &CancelToken::new(), |_, outcome| {
            seen.push((outcome.index, outcome.tag.clone()));
        })
        .expect("execute");

        assert_eq!(
            seen,
            vec![(0, None), (1, Some("TEST".to_string())), (2, None)]
        );
        assert!(plan.steps.iter().all(|s| s.state == StepState::Completed));
        assert_eq!(plan.steps[1].notes.as_deref(), Some("tested"));
        assert_eq!(gateway.call_count(), 3);
    }

    #[test]
    fn step_prompt_includes_report_and_marks_in_progress_first() {
        let gateway = ScriptedGateway::new([
            response("a", Vec::new()),
            response("b", Vec::new()),
            response("c", Vec::new()),
        ]);
        let mut exec = ExecutionLoop::new(&gateway, FakeCodeRunner::default(), settings());
        let mut plan = three_step_plan();
        execute_plan(&mut plan, &mut exec, &CancelToken::new(), |_, _| {}).expect("execute");

        let second = &gateway.requests()[1];
        let instruction = second
            .messages
            .iter()
            .rev()
            .nth(1)
            .map(|m| m.content.clone())
            .expect("instruction");
        assert!(instruction.contains("0. [✓] Write code"));
        assert!(instruction.contains("1. [→] [TEST] Run tests"));
        assert!(instruction.contains("You are now working on step 1: [TEST] Run tests"));
        assert!(instruction.contains("This is a TEST step."));
    }

    #[test]
    fn failed_terminate_blocks_step_and_continues() {
        let gateway = ScriptedGateway::new([
            terminate_response("failure"),
            response("tested", Vec::new()),
            terminate_response("success"),
        ]);
        let mut exec = ExecutionLoop::new(&gateway, FakeCodeRunner::default(), settings());
        let mut plan = three_step_plan();
        execute_plan(&mut plan, &mut exec, &CancelToken::new(), |_, _| {}).expect("execute");

        assert_eq!(plan.steps[0].state, StepState::Blocked);
        assert_eq!(
            plan.steps[0].notes.as_deref(),
            Some(r#"{"status":"failure"}"#)
        );
        assert_eq!(plan.steps[1].state, StepState::Completed);
        assert_eq!(plan.steps[2].state, StepState::Completed);
    }

    #[test]
    fn gateway_error_halts_and_leaves_step_in_progress() {
        let gateway = ScriptedGateway::new([response("done", Vec::new())])
            .then_fail(GatewayError::Api {
                status: 503,
                message: "busy".to_string(),
            });
        let mut exec = ExecutionLoop::new(&gateway, FakeCodeRunner::default(), settings());
        let mut plan = three_step_plan();
        let mut calls = 0;
        let err = execute_plan(&mut plan, &mut exec, &CancelToken::new(), |_, _| calls += 1)
            .unwrap_err();

        assert!(err.downcast_ref::<GatewayError>().is_some());
        assert_eq!(calls, 1);
        assert_eq!(plan.steps[0].state, StepState::Completed);
        assert_eq!(plan.steps[1].state, StepState::InProgress);
        assert_eq!(plan.steps[2].state, StepState::NotStarted);
        assert_eq!(gateway.call_count(), 2);
    }

    #[test]
    fn cancelled_token_stops_before_next_step() {
        let gateway = ScriptedGateway::new([response("never", Vec::new())]);
        let mut exec = ExecutionLoop::new(&gateway, FakeCodeRunner::default(), settings());
        let mut plan = three_step_plan();
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = execute_plan(&mut plan, &mut exec, &cancel, |_, _| {}).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GatewayError>(),
            Some(GatewayError::Cancelled)
        ));
        assert_eq!(gateway.call_count(), 0);
        assert_eq!(plan.steps[0].state, StepState::NotStarted);
    }

    #[test]
    fn delegations_never_exceed_step_count() {
        let gateway = ScriptedGateway::new([
            response("", vec![tool_call("c", "create_chat_completion", json!({"response": "x"}))]),
            response("y", Vec::new()),
            response("z", Vec::new()),
            response("extra", Vec::new()),
        ]);
        let mut exec = ExecutionLoop::new(&gateway, FakeCodeRunner::default(), settings());
        let mut plan = three_step_plan();
        execute_plan(&mut plan, &mut exec, &CancelToken::new(), |_, _| {}).expect("execute");
        assert_eq!(gateway.call_count(), 3);
        assert_eq!(plan.steps[0].notes.as_deref(), Some("x"));
    }

    #[test]
    fn resumes_from_first_not_started_step() {
        let gateway = ScriptedGateway::new([response("last", Vec::new())]);
        let mut exec = ExecutionLoop::new(&gateway, FakeCodeRunner::default(), settings());
        let mut plan = three_step_plan();
        plan.steps[0].state = StepState::Completed;
        plan.steps[1].state = StepState::Blocked;
        execute_plan(&mut plan, &mut exec, &CancelToken::new(), |_, _| {}).expect("execute");
        assert_eq!(gateway.call_count(), 1);
        assert_eq!(plan.steps[2].state, StepState::Completed);
    }

    #[test]
    fn empty_plan_is_a_no_op() {
        let gateway = ScriptedGateway::default();
        let mut exec = ExecutionLoop::new(&gateway, FakeCodeRunner::default(), settings());
        let mut plan = Plan::new("p", "empty", Vec::<String>::new());
        execute_plan(&mut plan, &mut exec, &CancelToken::new(), |_, _| {}).expect("execute");
        assert_eq!(gateway.call_count(), 0);
    }

    #[test]
    fn illegal_transition_is_scheduling_error() {
        let mut plan = three_step_plan();
        let err = mark_step(&mut plan, 0, StepState::Completed, None).unwrap_err();
        assert!(matches!(err, SchedulingError::IllegalTransition { index: 0, .. }));
    }
}
