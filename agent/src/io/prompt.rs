//! Prompt text for the planner and the execution loop.
//!
//! Templates live under `prompts/` and are compiled into the binary.

use anyhow::Result;
use minijinja::{Environment, context};

const PLANNER_SYSTEM: &str = include_str!("prompts/planner_system.md");
const PLANNER_REQUEST_TEMPLATE: &str = include_str!("prompts/planner_request.md");
const EXECUTOR_SYSTEM: &str = include_str!("prompts/executor_system.md");
const DIRECTIVE: &str = include_str!("prompts/directive.md");
const STEP_TEMPLATE: &str = include_str!("prompts/step.md");

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("planner_request", PLANNER_REQUEST_TEMPLATE)
            .expect("planner_request template should be valid");
        env.add_template("step", STEP_TEMPLATE)
            .expect("step template should be valid");
        Self { env }
    }

    fn render_planner_request(&self, task: &str) -> Result<String> {
        let template = self.env.get_template("planner_request")?;
        Ok(template.render(context! { task => task.trim() })?)
    }

    fn render_step(&self, input: &StepPrompt<'_>) -> Result<String> {
        let template = self.env.get_template("step")?;
        let rendered = template.render(context! {
            report => input.report.trim_end(),
            index => input.index,
            content => input.content,
            tag => input.tag,
        })?;
        Ok(rendered)
    }
}

/// Inputs for the per-step instruction.
#[derive(Debug, Clone, Copy)]
pub struct StepPrompt<'a> {
    pub report: &'a str,
    pub index: usize,
    pub content: &'a str,
    pub tag: Option<&'a str>,
}

/// Fixed persona for the planning call.
pub fn planner_system() -> &'static str {
    PLANNER_SYSTEM.trim_end()
}

/// User turn asking for a plan for `task`.
pub fn planner_request(task: &str) -> Result<String> {
    PromptEngine::new().render_planner_request(task)
}

/// Fixed persona for every execution-loop cycle.
pub fn executor_system() -> &'static str {
    EXECUTOR_SYSTEM.trim_end()
}

/// "Choose and use tools" directive appended to every execution-loop request.
pub fn tool_directive() -> &'static str {
    DIRECTIVE.trim_end()
}

/// Instruction handed to the execution loop for one step.
pub fn step_instruction(input: &StepPrompt<'_>) -> Result<String> {
    PromptEngine::new().render_step(input)
}
