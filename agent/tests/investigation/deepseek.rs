//! Planner and execution loop backed by the real DeepSeek gateway.
//!
//! ```bash
//! DEEPSEEK_API_KEY=... cargo test -p agent --test investigation_llm -- --ignored
//! # With logging:
//! TEST_LOG=1 RUST_LOG=debug cargo test -p agent --test investigation_llm -- --ignored --nocapture
//! ```

use std::sync::Once;

use agent::agents::executor::{ExecutionLoop, LoopSettings};
use agent::agents::planner::PlanningAgent;
use agent::cancel::CancelToken;
use agent::core::report::format_plan;
use agent::core::types::StepState;
use agent::io::code::EchoRunner;
use agent::io::config::AgentConfig;
use agent::io::deepseek::DeepSeekGateway;
use agent::scheduler::execute_plan;
use tracing::info;

static INIT_LOGGING: Once = Once::new();

fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        if std::env::var("TEST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string()))
                .init();
        }
    });
}

#[test]
#[ignore = "requires DEEPSEEK_API_KEY and network access"]
fn deepseek_planner_returns_steps() {
    init_test_logging();
    let config = AgentConfig::default();
    let gateway = DeepSeekGateway::new(config.llm);

    let plan = PlanningAgent::new()
        .create_plan(
            &gateway,
            "Write a short haiku about compilers and save it to a file",
            &CancelToken::new(),
        )
        .expect("plan");

    info!(report = %format_plan(&plan), "plan");
    assert!(!plan.title.trim().is_empty());
    assert!(!plan.steps.is_empty());
}

#[test]
#[ignore = "requires DEEPSEEK_API_KEY and network access"]
fn deepseek_executes_a_small_plan() {
    init_test_logging();
    let config = AgentConfig::default();
    let gateway = DeepSeekGateway::new(config.llm.clone());
    let cancel = CancelToken::new();

    let mut plan = PlanningAgent::new()
        .create_plan(
            &gateway,
            "Report the current working directory using the shell",
            &cancel,
        )
        .expect("plan");

    let mut exec = ExecutionLoop::new(&gateway, EchoRunner, LoopSettings::from_config(&config));
    execute_plan(&mut plan, &mut exec, &cancel, |plan, outcome| {
        info!(index = outcome.index, state = %outcome.state, report = %format_plan(plan), "step");
    })
    .expect("execute");

    assert!(plan.steps.iter().all(|s| s.state.is_terminal()));
    assert!(plan.count(StepState::NotStarted) == 0);
}
